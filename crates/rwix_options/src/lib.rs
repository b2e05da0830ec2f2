//! rwix_options: `rwix.json` parsing and toolset options.
//!
//! Every field is optional; command-line flags override file values.
//! Relative paths in a loaded file are resolved against the file's directory.

use rwix_backend::CompressionLevel;
use rwix_binder::BindPath;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rwix.json";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid configuration: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid bind path: {0}")]
    BindPath(String),

    #[error("thread count must be at least 1")]
    ZeroThreads,
}

/// A bind path written either as `"name=path"` / `"path"` or as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindPathSpec {
    Text(String),
    Entry(BindPath),
}

impl BindPathSpec {
    pub fn to_bind_path(&self) -> Result<BindPath, OptionsError> {
        match self {
            BindPathSpec::Text(s) => s.parse().map_err(OptionsError::BindPath),
            BindPathSpec::Entry(b) => Ok(b.clone()),
        }
    }
}

/// Toolset options, matching the `rwix.json` schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsetOptions {
    // -- Output --
    pub output_kind: Option<String>,
    pub output: Option<PathBuf>,

    // -- Inputs --
    pub intermediates: Option<Vec<PathBuf>>,
    /// Extra table definition files (JSON arrays) registered before linking.
    pub table_definitions: Option<Vec<PathBuf>>,

    // -- Binding --
    pub bind_paths: Option<Vec<BindPathSpec>>,
    pub default_compression: Option<CompressionLevel>,

    // -- Decompiling --
    pub extract_directory: Option<PathBuf>,

    // -- Execution --
    pub threads: Option<usize>,
}

impl ToolsetOptions {
    /// Parse options from JSON text. Paths are left as written.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Load options from a file, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut options = Self::parse(&content).map_err(|source| OptionsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            options.rebase(base);
        }
        Ok(options)
    }

    /// Load `rwix.json` from `dir` if it exists.
    pub fn discover(dir: &Path) -> Result<Option<Self>, OptionsError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(p) = self.output.as_mut() {
            join(p);
        }
        if let Some(p) = self.extract_directory.as_mut() {
            join(p);
        }
        self.intermediates.iter_mut().flatten().for_each(join);
        self.table_definitions.iter_mut().flatten().for_each(join);
        for spec in self.bind_paths.iter_mut().flatten() {
            *spec = match std::mem::replace(spec, BindPathSpec::Text(String::new())) {
                BindPathSpec::Text(s) => match s.parse::<BindPath>() {
                    Ok(mut b) => {
                        join(&mut b.path);
                        BindPathSpec::Entry(b)
                    }
                    // Left for `bind_paths()` to report.
                    Err(_) => BindPathSpec::Text(s),
                },
                BindPathSpec::Entry(mut b) => {
                    join(&mut b.path);
                    BindPathSpec::Entry(b)
                }
            };
        }
    }

    /// Apply `other` on top of `self`: every field `other` sets wins, except
    /// list fields, which are appended.
    pub fn merge(mut self, other: ToolsetOptions) -> Self {
        fn append<T>(base: &mut Option<Vec<T>>, more: Option<Vec<T>>) {
            if let Some(more) = more {
                base.get_or_insert_with(Vec::new).extend(more);
            }
        }
        self.output_kind = other.output_kind.or(self.output_kind);
        self.output = other.output.or(self.output);
        append(&mut self.intermediates, other.intermediates);
        append(&mut self.table_definitions, other.table_definitions);
        append(&mut self.bind_paths, other.bind_paths);
        self.default_compression = other.default_compression.or(self.default_compression);
        self.extract_directory = other.extract_directory.or(self.extract_directory);
        self.threads = other.threads.or(self.threads);
        self
    }

    /// The configured bind paths in declared order.
    pub fn bind_paths(&self) -> Result<Vec<BindPath>, OptionsError> {
        self.bind_paths
            .iter()
            .flatten()
            .map(BindPathSpec::to_bind_path)
            .collect()
    }

    /// The worker thread count; `None` lets the pool size itself.
    pub fn threads(&self) -> Result<Option<usize>, OptionsError> {
        match self.threads {
            Some(0) => Err(OptionsError::ZeroThreads),
            t => Ok(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let options = ToolsetOptions::parse(
            r#"{
                "outputKind": "msi",
                "output": "out/product.msi",
                "intermediates": ["product.wixobj", "files.wixobj"],
                "bindPaths": ["src", "media=assets", { "name": "docs", "path": "doc" }],
                "extractDirectory": "extracted",
                "threads": 4,
                "defaultCompression": "high",
                "tableDefinitions": ["shortcut.json"]
            }"#,
        )
        .unwrap();

        assert_eq!(options.output_kind.as_deref(), Some("msi"));
        assert_eq!(options.default_compression, Some(CompressionLevel::High));
        assert_eq!(options.threads().unwrap(), Some(4));
        assert_eq!(
            options.bind_paths().unwrap(),
            vec![
                BindPath::new("src"),
                BindPath::named("media", "assets"),
                BindPath::named("docs", "doc"),
            ]
        );
    }

    #[test]
    fn test_empty_config() {
        let options = ToolsetOptions::parse("{}").unwrap();
        assert_eq!(options, ToolsetOptions::default());
        assert!(options.bind_paths().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_bind_path() {
        let options = ToolsetOptions::parse(r#"{ "bindPaths": ["=nowhere"] }"#).unwrap();
        assert!(matches!(options.bind_paths(), Err(OptionsError::BindPath(_))));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let options = ToolsetOptions::parse(r#"{ "threads": 0 }"#).unwrap();
        assert!(matches!(options.threads(), Err(OptionsError::ZeroThreads)));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "output": "out/a.msi", "bindPaths": ["media=assets"], "intermediates": ["a.wixobj"] }"#,
        )
        .unwrap();

        let options = ToolsetOptions::discover(dir.path()).unwrap().unwrap();
        assert_eq!(options.output, Some(dir.path().join("out/a.msi")));
        assert_eq!(options.intermediates, Some(vec![dir.path().join("a.wixobj")]));
        assert_eq!(
            options.bind_paths().unwrap(),
            vec![BindPath::named("media", dir.path().join("assets"))]
        );
    }

    #[test]
    fn test_discover_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(ToolsetOptions::discover(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ \"threads\": \"many\" }").unwrap();
        let err = ToolsetOptions::load(&path).unwrap_err();
        assert!(err.to_string().contains("rwix.json"));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = ToolsetOptions {
            output_kind: Some("msi".to_string()),
            threads: Some(2),
            bind_paths: Some(vec![BindPathSpec::Text("a".to_string())]),
            ..Default::default()
        };
        let flags = ToolsetOptions {
            output_kind: Some("msm".to_string()),
            bind_paths: Some(vec![BindPathSpec::Text("b".to_string())]),
            ..Default::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.output_kind.as_deref(), Some("msm"));
        assert_eq!(merged.threads, Some(2));
        assert_eq!(merged.bind_paths().unwrap(), vec![BindPath::new("a"), BindPath::new("b")]);
    }
}
