//! Backend errors.

use rwix_ir::SectionKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend '{backend}' does not support {capability}")]
    UnsupportedCapability {
        backend: String,
        capability: &'static str,
    },

    #[error("malformed binary input: {reason}")]
    MalformedBinaryInput { reason: String },

    #[error("table '{0}' is not registered")]
    UnknownTable(String),

    #[error("backend '{backend}' cannot consume {kind} sections")]
    IncompatibleOutput { backend: String, kind: SectionKind },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        BackendError::MalformedBinaryInput {
            reason: reason.into(),
        }
    }
}
