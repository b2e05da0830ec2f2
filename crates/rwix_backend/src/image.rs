//! In-memory form of a binary installer database.

use rwix_ir::{Row, SectionKind, Value};
use rwix_schema::TableDefinition;
use std::collections::BTreeMap;

/// One table of a database: the definition it was written with and its rows
/// as positional cells (`None` is null).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableImage {
    pub definition: TableDefinition,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl TableImage {
    pub fn new(definition: TableDefinition) -> Self {
        Self {
            definition,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Convert a row into column-name form, dropping nulls.
    pub fn row(&self, index: usize) -> Option<Row> {
        let cells = self.rows.get(index)?;
        let mut row = Row::new(self.definition.name.clone());
        for (column, cell) in self.definition.columns.iter().zip(cells) {
            if let Some(value) = cell {
                row.set(column.name.clone(), value.clone());
            }
        }
        Some(row)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.rows.len()).filter_map(move |i| self.row(i))
    }
}

/// A whole database: its kind, summary properties, tables and named streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseImage {
    pub kind: SectionKind,
    /// Summary properties by property id.
    pub summary: BTreeMap<u16, String>,
    pub tables: Vec<TableImage>,
    /// Named binary streams, sorted by name.
    pub streams: BTreeMap<String, Vec<u8>>,
}

impl DatabaseImage {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            summary: BTreeMap::new(),
            tables: Vec::new(),
            streams: BTreeMap::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableImage> {
        self.tables.iter().find(|t| t.definition.name == name)
    }
}

/// Name of the stream holding a Stream column's payload for one row.
pub fn stream_name(table: &str, key: &str) -> String {
    format!("{}.{}", table, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwix_schema::TableRegistry;

    #[test]
    fn test_row_drops_nulls() {
        let registry = TableRegistry::standard();
        let mut image = TableImage::new(registry.get("Property").unwrap().clone());
        image.rows.push(vec![Some(Value::from("ALLUSERS")), None]);
        let row = image.row(0).unwrap();
        assert_eq!(row.get_str("Property"), Some("ALLUSERS"));
        assert!(row.get("Value").is_none());
        assert!(image.row(1).is_none());
    }
}
