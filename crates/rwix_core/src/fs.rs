//! Filesystem helpers.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Whether `name` is a single path component that stays inside the
/// directory it is joined onto.
///
/// Rejects empty names, `.` and `..`, separators of either platform, drive
/// prefixes and NUL.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':', '\0'])
}

/// Write a file atomically (write to a uniquely named temporary sibling,
/// then rename).
///
/// An existing file at `path` is replaced. On failure the temporary file is
/// removed and nothing is left at `path` that was not there before.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dirs(path)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("out.bin");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert_eq!(entries(path.parent().unwrap()), vec!["out.bin"]);
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        atomic_write(&path, b"first version").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_concurrent_writes_to_same_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.bin");
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 4096]).collect();

        std::thread::scope(|scope| {
            for payload in &payloads {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..16 {
                        atomic_write(path, payload).unwrap();
                    }
                });
            }
        });

        // Whole payload from one writer, never a mix.
        let written = std::fs::read(&path).unwrap();
        assert!(payloads.contains(&written));
        assert_eq!(entries(dir.path()), vec!["shared.bin"]);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        // Renaming a file over a non-empty directory fails.
        assert!(atomic_write(&path, b"data").is_err());
        assert_eq!(entries(dir.path()), vec!["target"]);
    }

    #[test]
    fn test_plain_file_names() {
        for name in ["file.cab", "Product.msi", ".hidden", "a b", "x..y"] {
            assert!(is_plain_file_name(name), "{name}");
        }
        for name in ["", ".", "..", "../x", "a/b", "a\\b", "C:x", "/etc/passwd", "nul\0"] {
            assert!(!is_plain_file_name(name), "{name:?}");
        }
    }
}
