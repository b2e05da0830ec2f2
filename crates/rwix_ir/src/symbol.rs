//! Symbol names and the persisted symbol map.

use crate::intermediate::IrError;
use rwix_diagnostics::Provenance;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The symbol name of a row: `Table.key`.
pub fn symbol_name(table: &str, key: &str) -> String {
    format!("{}.{}", table, key)
}

/// One emitted row keyed back to the symbol and section it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMapEntry {
    pub table: String,
    /// The row's primary key, or `#<n>` (1-based position in its table) for
    /// tables without one.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub provenance: Provenance,
}

/// Maps every emitted row back to its originating symbol.
///
/// Written next to the artifact for incremental work, patching and debug
/// correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMap {
    pub artifact: String,
    pub entries: Vec<SymbolMapEntry>,
}

impl SymbolMap {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: SymbolMapEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolMapEntry> {
        self.entries.iter().find(|e| e.symbol.as_deref() == Some(symbol))
    }

    pub fn save(&self, path: &Path) -> Result<(), IrError> {
        let json = serde_json::to_vec_pretty(self)?;
        rwix_core::fs::atomic_write(path, &json).map_err(|source| IrError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, IrError> {
        let content = std::fs::read_to_string(path).map_err(|source| IrError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| IrError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
