//! The core table set every registry starts from.

use crate::column::{ColumnDefinition as Col, ColumnType};
use crate::registry::TableRegistry;
use crate::table::{ContainerBinding, DirectoryBinding, PayloadBinding, TableDefinition};

/// Summary property ids understood by the core backends.
pub mod summary {
    pub const TITLE: u16 = 2;
    pub const SUBJECT: u16 = 3;
    pub const AUTHOR: u16 = 4;
    pub const TEMPLATE: u16 = 7;
    pub const REVISION_NUMBER: u16 = 9;
    pub const PAGE_COUNT: u16 = 14;
    pub const WORD_COUNT: u16 = 15;
}

impl TableRegistry {
    /// A registry holding the core installer tables.
    pub fn standard() -> Self {
        let mut registry = TableRegistry::new();
        for table in standard_tables() {
            // Names below are distinct.
            let _ = registry.register(table);
        }
        registry
    }
}

fn standard_tables() -> Vec<TableDefinition> {
    vec![
        TableDefinition::new(
            "SummaryInformation",
            vec![
                Col::new("PropertyId", ColumnType::SHORT).primary_key(),
                Col::new("Value", ColumnType::TEXT),
            ],
        ),
        TableDefinition::new(
            "Property",
            vec![
                Col::new("Property", ColumnType::Identifier).primary_key(),
                Col::new("Value", ColumnType::TEXT),
            ],
        ),
        TableDefinition::new(
            "Directory",
            vec![
                Col::new("Directory", ColumnType::Identifier).primary_key(),
                Col::new("Directory_Parent", ColumnType::Identifier)
                    .nullable()
                    .foreign_key("Directory"),
                Col::new("DefaultDir", ColumnType::String { max_len: Some(255) }),
            ],
        )
        .with_directory(DirectoryBinding {
            parent: "Directory_Parent".to_string(),
            name: "DefaultDir".to_string(),
        }),
        TableDefinition::new(
            "Feature",
            vec![
                Col::new("Feature", ColumnType::Identifier).primary_key(),
                Col::new("Feature_Parent", ColumnType::Identifier)
                    .nullable()
                    .foreign_key("Feature"),
                Col::new("Title", ColumnType::String { max_len: Some(64) }).nullable(),
                Col::new("Level", ColumnType::SHORT),
            ],
        ),
        TableDefinition::new(
            "Component",
            vec![
                Col::new("Component", ColumnType::Identifier).primary_key(),
                Col::new("ComponentId", ColumnType::String { max_len: Some(38) }).nullable(),
                Col::new("Directory_", ColumnType::Identifier).foreign_key("Directory"),
                Col::new("Attributes", ColumnType::SHORT),
                Col::new("KeyPath", ColumnType::Identifier).nullable(),
            ],
        ),
        TableDefinition::new(
            "FeatureComponents",
            vec![
                Col::new("Feature_", ColumnType::Identifier)
                    .primary_key()
                    .foreign_key("Feature"),
                Col::new("Component_", ColumnType::Identifier)
                    .primary_key()
                    .foreign_key("Component"),
            ],
        ),
        TableDefinition::new(
            "Media",
            vec![
                Col::new("DiskId", ColumnType::SHORT).primary_key(),
                Col::new("LastSequence", ColumnType::LONG).nullable(),
                Col::new("Cabinet", ColumnType::String { max_len: Some(255) }).nullable(),
                Col::new("CompressionLevel", ColumnType::String { max_len: Some(16) }).nullable(),
            ],
        )
        .with_container(ContainerBinding {
            cabinet: "Cabinet".to_string(),
            compression: Some("CompressionLevel".to_string()),
            last_sequence: Some("LastSequence".to_string()),
        }),
        TableDefinition::new(
            "File",
            vec![
                Col::new("File", ColumnType::Identifier).primary_key(),
                Col::new("Component_", ColumnType::Identifier).foreign_key("Component"),
                Col::new("FileName", ColumnType::String { max_len: Some(255) }),
                Col::new("FileSize", ColumnType::LONG).nullable(),
                Col::new("Sequence", ColumnType::LONG).nullable(),
                Col::new("DiskId", ColumnType::SHORT).nullable().foreign_key("Media"),
                Col::new("Source", ColumnType::Path),
            ],
        )
        .with_payload(PayloadBinding {
            source: "Source".to_string(),
            name: Some("FileName".to_string()),
            size: Some("FileSize".to_string()),
            sequence: Some("Sequence".to_string()),
            container: Some("DiskId".to_string()),
            target: vec!["Component_".to_string(), "Directory_".to_string()],
        }),
        TableDefinition::new(
            "Font",
            vec![
                Col::new("File_", ColumnType::Identifier)
                    .primary_key()
                    .foreign_key("File"),
                Col::new("FontTitle", ColumnType::TEXT).nullable(),
            ],
        ),
        TableDefinition::new(
            "Binary",
            vec![
                Col::new("Name", ColumnType::Identifier).primary_key(),
                Col::new("Data", ColumnType::Stream),
            ],
        ),
        TableDefinition::new(
            "Icon",
            vec![
                Col::new("Name", ColumnType::Identifier).primary_key(),
                Col::new("Data", ColumnType::Stream),
            ],
        ),
    ]
}
