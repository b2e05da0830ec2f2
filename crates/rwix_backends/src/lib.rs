//! rwix_backends: The core output backends.
//!
//! - `msi`: installer databases, from product sections
//! - `msm`: merge modules, from module sections
//! - `wixlib` / `library`: serialized intermediates (compile-emit only)

pub mod database;
mod library;
mod package;

pub use library::LibraryBackend;
pub use package::{PackageBackend, SUMMARY_TABLE};

use rwix_backend::{Backend, BackendFactory};
use std::path::Path;

/// The output kind implied by a path's extension, lowercased.
pub fn output_kind_for_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Creates the core backends. Kinds are matched case-insensitively; an empty
/// kind is inferred from the output path's extension.
#[derive(Debug, Clone, Default)]
pub struct CoreBackendFactory;

impl BackendFactory for CoreBackendFactory {
    fn try_create_backend(&self, output_kind: &str, output_path: &Path) -> Option<Box<dyn Backend>> {
        let kind = if output_kind.is_empty() {
            output_kind_for_path(output_path)?
        } else {
            output_kind.to_ascii_lowercase()
        };
        match kind.as_str() {
            "msi" => Some(Box::new(PackageBackend::installer())),
            "msm" => Some(Box::new(PackageBackend::merge_module())),
            "wixlib" | "library" => Some(Box::new(LibraryBackend)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwix_backend::Capabilities;

    #[test]
    fn test_known_kinds() {
        let factory = CoreBackendFactory;
        let path = Path::new("out/product.msi");
        let msi = factory.try_create_backend("MSI", path).unwrap();
        assert_eq!(msi.output_kind(), "msi");
        assert!(msi.supports(Capabilities::BIND_EMIT | Capabilities::DECOMPILE_INGEST));
        assert_eq!(factory.try_create_backend("msm", path).unwrap().output_kind(), "msm");
        assert_eq!(factory.try_create_backend("library", path).unwrap().output_kind(), "wixlib");
    }

    #[test]
    fn test_unknown_kind_is_none() {
        assert!(CoreBackendFactory
            .try_create_backend("unknown-kind", Path::new("out.msi"))
            .is_none());
    }

    #[test]
    fn test_empty_kind_uses_extension() {
        let factory = CoreBackendFactory;
        let backend = factory.try_create_backend("", Path::new("module.MSM")).unwrap();
        assert_eq!(backend.output_kind(), "msm");
        assert!(factory.try_create_backend("", Path::new("noextension")).is_none());
    }
}
