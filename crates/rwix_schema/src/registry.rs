//! The table registry.

use crate::column::ColumnType;
use crate::table::TableDefinition;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table '{0}' is already registered")]
    DuplicateTable(String),

    #[error("table '{table}' declares column '{column}' twice")]
    DuplicateColumn { table: String, column: String },

    #[error("column '{table}.{column}' references unknown table '{target}'")]
    DanglingForeignKey {
        table: String,
        column: String,
        target: String,
    },

    #[error("column '{table}.{column}' references table '{target}', which has {count} primary key columns (exactly one is required)")]
    ForeignKeyTargetKey {
        table: String,
        column: String,
        target: String,
        count: usize,
    },

    #[error("invalid binding on table '{table}': {reason}")]
    InvalidBinding { table: String, reason: String },

    #[error("failed to parse table definitions: {0}")]
    Parse(String),
}

/// An ordered set of table definitions.
///
/// Registration order is preserved and is the order tables are emitted in.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: IndexMap<String, TableDefinition>,
}

impl TableRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tables: IndexMap::new(),
        }
    }

    /// Register a table. Fails if the name is taken.
    pub fn register(&mut self, table: TableDefinition) -> Result<(), SchemaError> {
        if self.tables.contains_key(&table.name) {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        for (i, column) in table.columns.iter().enumerate() {
            if table.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Register every table in `tables`, stopping at the first failure.
    pub fn register_all(
        &mut self,
        tables: impl IntoIterator<Item = TableDefinition>,
    ) -> Result<(), SchemaError> {
        for table in tables {
            self.register(table)?;
        }
        Ok(())
    }

    /// Parse a JSON array of table definitions.
    pub fn parse_definitions(json: &str) -> Result<Vec<TableDefinition>, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Position of a table in registration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.tables.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables whose rows are file payloads.
    pub fn payload_tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.values().filter(|t| t.payload.is_some())
    }

    /// Check that every foreign key and binding refers to something that exists.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();
        for table in self.tables.values() {
            for (column, target) in table.foreign_keys() {
                match self.tables.get(target) {
                    None => errors.push(SchemaError::DanglingForeignKey {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target: target.to_string(),
                    }),
                    Some(target_table) => {
                        let count = target_table.primary_keys().count();
                        if count != 1 {
                            errors.push(SchemaError::ForeignKeyTargetKey {
                                table: table.name.clone(),
                                column: column.name.clone(),
                                target: target.to_string(),
                                count,
                            });
                        }
                    }
                }
            }
            self.validate_bindings(table, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_bindings(&self, table: &TableDefinition, errors: &mut Vec<SchemaError>) {
        let invalid = |reason: String| SchemaError::InvalidBinding {
            table: table.name.clone(),
            reason,
        };

        if let Some(ref payload) = table.payload {
            match table.column(&payload.source) {
                Some(c) if c.ty == ColumnType::Path => {}
                _ => errors.push(invalid(format!("payload source '{}' must be a path column", payload.source))),
            }
            if let Some(ref name) = payload.name {
                if table.column(name).is_none() {
                    errors.push(invalid(format!("payload name column '{}' does not exist", name)));
                }
            }
            for name in payload.size.iter().chain(payload.sequence.iter()) {
                if !table.column(name).is_some_and(|c| c.ty.is_integer()) {
                    errors.push(invalid(format!("'{}' must be an integer column", name)));
                }
            }
            if let Some(ref container) = payload.container {
                let target = table.column(container).and_then(|c| c.foreign_key.as_deref());
                match target.and_then(|t| self.tables.get(t)) {
                    Some(t) if t.container.is_some() => {}
                    _ => errors.push(invalid(format!(
                        "payload container '{}' must reference a container table",
                        container
                    ))),
                }
            }
            if !payload.target.is_empty() {
                let mut current = table;
                for hop in &payload.target {
                    let next = current
                        .column(hop)
                        .and_then(|c| c.foreign_key.as_deref())
                        .and_then(|t| self.tables.get(t));
                    match next {
                        Some(next) => current = next,
                        None => {
                            errors.push(invalid(format!(
                                "target hop '{}.{}' is not a foreign key",
                                current.name, hop
                            )));
                            return;
                        }
                    }
                }
                if current.directory.is_none() {
                    errors.push(invalid(format!(
                        "payload target chain ends at '{}', which is not a directory table",
                        current.name
                    )));
                }
            }
        }

        if let Some(ref directory) = table.directory {
            let parent_ok = table
                .column(&directory.parent)
                .is_some_and(|c| c.foreign_key.as_deref() == Some(table.name.as_str()));
            if !parent_ok {
                errors.push(invalid(format!(
                    "directory parent '{}' must reference '{}' itself",
                    directory.parent, table.name
                )));
            }
            if table.column(&directory.name).is_none() {
                errors.push(invalid(format!("directory name column '{}' is missing", directory.name)));
            }
        }

        if let Some(ref container) = table.container {
            if table.column(&container.cabinet).is_none() {
                errors.push(invalid(format!("container cabinet column '{}' is missing", container.cabinet)));
            }
            if let Some(ref compression) = container.compression {
                if table.column(compression).is_none() {
                    errors.push(invalid(format!("compression column '{}' is missing", compression)));
                }
            }
            if let Some(ref last) = container.last_sequence {
                if !table.column(last).is_some_and(|c| c.ty.is_integer()) {
                    errors.push(invalid(format!("'{}' must be an integer column", last)));
                }
            }
        }
    }
}
