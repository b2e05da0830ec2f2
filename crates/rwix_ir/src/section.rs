//! Sections.

use crate::row::Row;
use crate::symbol::symbol_name;
use rwix_schema::TableRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a section contributes to; constrains which backend may consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Product,
    Fragment,
    Module,
    Patch,
    Bundle,
}

impl SectionKind {
    /// Every kind but Fragment is an entry section: it decides the output.
    pub fn is_entry(self) -> bool {
        !matches!(self, SectionKind::Fragment)
    }

    pub fn tag(self) -> u8 {
        match self {
            SectionKind::Product => 0,
            SectionKind::Fragment => 1,
            SectionKind::Module => 2,
            SectionKind::Patch => 3,
            SectionKind::Bundle => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SectionKind::Product),
            1 => Some(SectionKind::Fragment),
            2 => Some(SectionKind::Module),
            3 => Some(SectionKind::Patch),
            4 => Some(SectionKind::Bundle),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Product => "product",
            SectionKind::Fragment => "fragment",
            SectionKind::Module => "module",
            SectionKind::Patch => "patch",
            SectionKind::Bundle => "bundle",
        };
        write!(f, "{}", name)
    }
}

/// A named, typed, ordered collection of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub kind: SectionKind,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Section {
    pub fn new(id: impl Into<String>, kind: SectionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Symbols this section defines, in row order.
    pub fn defined_symbols(&self, registry: &TableRegistry) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.symbol_name(registry.get(&row.table)?))
            .collect()
    }

    /// Symbol names this section's foreign-key columns reference.
    pub fn referenced_symbols(&self, registry: &TableRegistry) -> BTreeSet<String> {
        let mut references = BTreeSet::new();
        for row in &self.rows {
            let Some(table) = registry.get(&row.table) else {
                continue;
            };
            for (column, target) in table.foreign_keys() {
                if let Some(value) = row.get(&column.name) {
                    references.insert(symbol_name(target, &value.to_string()));
                }
            }
        }
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_and_referenced_symbols() {
        let registry = TableRegistry::standard();
        let section = Section::new("files", SectionKind::Fragment)
            .with_row(
                Row::new("File")
                    .with("File", "readme")
                    .with("Component_", "Docs")
                    .with("DiskId", 1),
            )
            .with_row(Row::new("Property").with("Property", "ALLUSERS").with("Value", "1"));

        assert_eq!(section.defined_symbols(&registry), vec!["File.readme", "Property.ALLUSERS"]);
        let refs: Vec<_> = section.referenced_symbols(&registry).into_iter().collect();
        assert_eq!(refs, vec!["Component.Docs", "Media.1"]);
    }

    #[test]
    fn test_kind_tags() {
        for kind in [
            SectionKind::Product,
            SectionKind::Fragment,
            SectionKind::Module,
            SectionKind::Patch,
            SectionKind::Bundle,
        ] {
            assert_eq!(SectionKind::from_tag(kind.tag()), Some(kind));
        }
        assert!(!SectionKind::Fragment.is_entry());
        assert!(SectionKind::Module.is_entry());
    }
}
