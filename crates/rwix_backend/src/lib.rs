//! rwix_backend: Backend contracts.
//!
//! A backend is bound to one output kind (`msi`, `msm`, `wixlib`, ...) and
//! advertises which of compile-emit, bind-emit and decompile-ingest it
//! supports. Backends are found through an ordered list of factories given
//! explicitly by the caller; there is no global registration.

pub mod codec;
mod capability;
mod container;
mod error;
mod image;

pub use capability::Capabilities;
pub use container::{CompressionLevel, Container, ContainerEntry, CONTAINER_MAGIC};
pub use error::{BackendError, Result};
pub use image::{stream_name, DatabaseImage, TableImage};

use rwix_diagnostics::Diagnostic;
use rwix_ir::{Intermediate, ResolvedIntermediate, SectionKind};
use rwix_schema::TableRegistry;
use std::collections::BTreeMap;
use std::path::Path;

/// A container built by the binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedContainer {
    /// File or stream name, without the `#` embedding marker.
    pub name: String,
    /// Whether the container is stored inside the artifact.
    pub embedded: bool,
    pub bytes: Vec<u8>,
}

/// Everything a backend needs to emit a database.
pub struct EmitRequest<'a> {
    pub registry: &'a TableRegistry,
    /// Rows with bind-computed columns already filled in.
    pub resolved: &'a ResolvedIntermediate,
    /// Stream column payloads by stream name (`Table.key`).
    pub streams: &'a BTreeMap<String, Vec<u8>>,
    pub containers: &'a [PackagedContainer],
}

/// The artifact bytes plus any warnings raised while producing them.
#[derive(Debug, Clone, Default)]
pub struct EmitOutput {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A capability object for one output kind.
pub trait Backend: Send + Sync {
    /// The output kind this backend was created for.
    fn output_kind(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Whether this backend can consume a resolved intermediate of `kind`.
    fn accepts(&self, kind: SectionKind) -> bool;

    /// Serialize an unlinked intermediate.
    fn emit_intermediate(&self, _intermediate: &Intermediate) -> Result<Vec<u8>> {
        Err(self.unsupported(Capabilities::COMPILE_EMIT))
    }

    /// Produce the artifact bytes for a bound intermediate.
    fn emit_database(&self, _request: &EmitRequest<'_>) -> Result<EmitOutput> {
        Err(self.unsupported(Capabilities::BIND_EMIT))
    }

    /// Parse artifact bytes.
    fn ingest(&self, _bytes: &[u8]) -> Result<DatabaseImage> {
        Err(self.unsupported(Capabilities::DECOMPILE_INGEST))
    }

    fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities().contains(capability)
    }

    /// Fail with `UnsupportedCapability` unless `capability` is supported.
    fn require(&self, capability: Capabilities) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(self.unsupported(capability))
        }
    }

    fn unsupported(&self, capability: Capabilities) -> BackendError {
        BackendError::UnsupportedCapability {
            backend: self.output_kind().to_string(),
            capability: capability.name(),
        }
    }
}

/// Creates backends for the output kinds it knows.
pub trait BackendFactory: Send + Sync {
    /// `None` when this factory does not know `output_kind`.
    fn try_create_backend(&self, output_kind: &str, output_path: &Path) -> Option<Box<dyn Backend>>;
}

/// An ordered list of factories; the first one that knows a kind wins.
#[derive(Default)]
pub struct BackendFactories {
    factories: Vec<Box<dyn BackendFactory>>,
}

impl BackendFactories {
    pub fn new(factories: Vec<Box<dyn BackendFactory>>) -> Self {
        Self { factories }
    }

    pub fn push(&mut self, factory: Box<dyn BackendFactory>) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn try_create_backend(&self, output_kind: &str, output_path: &Path) -> Option<Box<dyn Backend>> {
        self.factories
            .iter()
            .find_map(|f| f.try_create_backend(output_kind, output_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, Capabilities);

    impl Backend for Named {
        fn output_kind(&self) -> &str {
            self.0
        }
        fn capabilities(&self) -> Capabilities {
            self.1
        }
        fn accepts(&self, _kind: SectionKind) -> bool {
            true
        }
    }

    struct Only(&'static str, &'static str);

    impl BackendFactory for Only {
        fn try_create_backend(&self, output_kind: &str, _path: &Path) -> Option<Box<dyn Backend>> {
            (output_kind == self.0).then(|| Box::new(Named(self.1, Capabilities::empty())) as Box<dyn Backend>)
        }
    }

    #[test]
    fn test_first_factory_wins() {
        let factories = BackendFactories::new(vec![
            Box::new(Only("msi", "first")),
            Box::new(Only("msi", "second")),
            Box::new(Only("msm", "third")),
        ]);
        let path = Path::new("out.msi");
        assert_eq!(factories.try_create_backend("msi", path).unwrap().output_kind(), "first");
        assert_eq!(factories.try_create_backend("msm", path).unwrap().output_kind(), "third");
        assert!(factories.try_create_backend("unknown-kind", path).is_none());
    }

    #[test]
    fn test_missing_capability_is_named() {
        let backend = Named("wixlib", Capabilities::COMPILE_EMIT);
        let err = backend.ingest(b"").unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedCapability { capability: "decompile-ingest", .. }
        ));
        assert!(backend.require(Capabilities::COMPILE_EMIT).is_ok());
        assert!(backend.require(Capabilities::BIND_EMIT).is_err());
    }
}
