//! Table definitions and the declarative bindings attached to them.

use crate::column::ColumnDefinition;
use serde::{Deserialize, Serialize};

/// Marks a table whose rows are file payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadBinding {
    /// Path column holding the authored source location.
    pub source: String,
    /// Column holding the installed file name; the row key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Integer column receiving the resolved byte size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Integer column receiving the 1-based install sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    /// Foreign-key column naming the container the payload is packaged into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Foreign-key columns to follow, starting at this table, to reach the
    /// directory the payload is installed into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,
}

/// Marks a table whose rows form a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryBinding {
    /// Self-referencing foreign-key column naming the parent directory.
    pub parent: String,
    /// Column holding the directory's name. `X:` or `X:\...` names a volume.
    pub name: String,
}

/// Marks a table whose rows are payload containers (cabinets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBinding {
    /// Column holding the container file name; a leading `#` embeds it.
    pub cabinet: String,
    /// Column holding the declared compression level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Integer column receiving the last sequence number packaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<String>,
}

/// A table: its name, ordered columns, and optional bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<DirectoryBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerBinding>,
    /// False for tables whose rows have no lossless source form.
    #[serde(default = "default_round_trip")]
    pub round_trip: bool,
}

fn default_round_trip() -> bool {
    true
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
            payload: None,
            directory: None,
            container: None,
            round_trip: true,
        }
    }

    pub fn with_payload(mut self, binding: PayloadBinding) -> Self {
        self.payload = Some(binding);
        self
    }

    pub fn with_directory(mut self, binding: DirectoryBinding) -> Self {
        self.directory = Some(binding);
        self
    }

    pub fn with_container(mut self, binding: ContainerBinding) -> Self {
        self.container = Some(binding);
        self
    }

    pub fn without_round_trip(mut self) -> Self {
        self.round_trip = false;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&ColumnDefinition, &str)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_deref().map(|t| (c, t)))
    }

    /// Columns whose values name payload files (path and stream columns).
    pub fn payload_source_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.ty.is_payload_source())
    }

    /// Stream columns only.
    pub fn stream_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| c.ty == crate::ColumnType::Stream)
    }
}
