//! The library backend (`wixlib`).

use rwix_backend::{Backend, Capabilities, Result};
use rwix_ir::{Intermediate, SectionKind};

/// Serializes unlinked intermediates so they can be linked later.
#[derive(Debug, Clone, Default)]
pub struct LibraryBackend;

impl Backend for LibraryBackend {
    fn output_kind(&self) -> &str {
        "wixlib"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::COMPILE_EMIT
    }

    fn accepts(&self, _kind: SectionKind) -> bool {
        true
    }

    fn emit_intermediate(&self, intermediate: &Intermediate) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(intermediate)?)
    }
}
