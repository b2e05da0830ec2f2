//! Rows.

use crate::symbol::symbol_name;
use crate::value::Value;
use indexmap::IndexMap;
use rwix_schema::TableDefinition;
use serde::{Deserialize, Serialize};

/// A row: its table and the values of its non-null columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub table: String,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

impl Row {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Make a column null.
    pub fn clear(&mut self, column: &str) -> Option<Value> {
        self.fields.shift_remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Value::as_str)
    }

    pub fn get_integer(&self, column: &str) -> Option<i64> {
        self.fields.get(column).and_then(Value::as_integer)
    }

    /// The primary key, composite parts joined by `/`. The linker rejects
    /// composite key parts that contain `/` themselves.
    ///
    /// `None` when the table has no primary key or a key column is null.
    pub fn key(&self, table: &TableDefinition) -> Option<String> {
        let mut parts = Vec::new();
        for column in table.primary_keys() {
            parts.push(self.fields.get(&column.name)?.to_string());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// The symbol this row defines, e.g. `File.readme`.
    pub fn symbol_name(&self, table: &TableDefinition) -> Option<String> {
        self.key(table).map(|key| symbol_name(&self.table, &key))
    }

    /// Serialized row content in column-definition order, used to tell
    /// idempotent redefinitions from conflicting ones.
    ///
    /// Columns the definition does not know are appended in name order.
    pub fn canonical_content(&self, table: &TableDefinition) -> String {
        let mut known: Vec<Option<&Value>> = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            known.push(self.fields.get(&column.name));
        }
        let mut extra: Vec<(&String, &Value)> = self
            .fields
            .iter()
            .filter(|(name, _)| table.column(name).is_none())
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        // Serializing plain values and strings cannot fail.
        serde_json::to_string(&(known, extra)).unwrap_or_default()
    }

    /// The fields reordered to follow the table definition.
    pub fn normalized(&self, table: &TableDefinition) -> Row {
        let mut row = Row::new(self.table.clone());
        for column in &table.columns {
            if let Some(value) = self.fields.get(&column.name) {
                row.fields.insert(column.name.clone(), value.clone());
            }
        }
        for (name, value) in &self.fields {
            if table.column(name).is_none() {
                row.fields.insert(name.clone(), value.clone());
            }
        }
        row
    }
}
