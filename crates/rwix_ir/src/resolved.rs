//! The linker's output: one flattened, fully resolved table model.

use crate::intermediate::{Intermediate, PayloadData};
use crate::row::Row;
use crate::section::{Section, SectionKind};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use rwix_core::Platform;
use rwix_diagnostics::Provenance;
use serde::{Deserialize, Serialize};

/// A row in a resolved intermediate, with the symbol it defines and the
/// section it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRow {
    pub row: Row,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub provenance: Provenance,
}

/// Every row of every linked section, grouped by table.
///
/// Tables follow registry order; rows within a table follow input order.
/// Every foreign-key value names an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIntermediate {
    /// The entry section's kind, or `Fragment` when only fragments were linked.
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub tables: IndexMap<String, Vec<LinkedRow>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub payloads: IndexMap<String, PayloadData>,
}

impl ResolvedIntermediate {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            platform: None,
            tables: IndexMap::new(),
            payloads: IndexMap::new(),
        }
    }

    pub fn rows(&self, table: &str) -> &[LinkedRow] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows_mut(&mut self, table: &str) -> Option<&mut Vec<LinkedRow>> {
        self.tables.get_mut(table)
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &LinkedRow> {
        self.tables.values().flatten()
    }

    /// Look up rows by the symbol they define.
    pub fn symbol_index(&self) -> FxHashMap<&str, &LinkedRow> {
        self.iter_rows()
            .filter_map(|r| r.symbol.as_deref().map(|s| (s, r)))
            .collect()
    }

    pub fn find(&self, symbol: &str) -> Option<&LinkedRow> {
        self.iter_rows().find(|r| r.symbol.as_deref() == Some(symbol))
    }

    /// Flatten back into an intermediate with a single section.
    pub fn to_intermediate(&self, id: impl Into<String>) -> Intermediate {
        let id = id.into();
        let mut section = Section::new(id.clone(), self.kind);
        section.rows = self.iter_rows().map(|r| r.row.clone()).collect();
        Intermediate {
            id,
            platform: self.platform,
            sections: vec![section],
            payloads: self.payloads.clone(),
        }
    }
}
