//! Column definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerWidth {
    /// 16-bit signed.
    Short,
    /// 32-bit signed.
    Long,
}

impl IntegerWidth {
    pub fn bytes(self) -> u16 {
        match self {
            IntegerWidth::Short => 2,
            IntegerWidth::Long => 4,
        }
    }

    pub fn from_bytes(bytes: u16) -> Option<Self> {
        match bytes {
            2 => Some(IntegerWidth::Short),
            4 => Some(IntegerWidth::Long),
            _ => None,
        }
    }

    /// Whether `value` fits in this width.
    pub fn fits(self, value: i64) -> bool {
        match self {
            IntegerWidth::Short => i16::try_from(value).is_ok(),
            IntegerWidth::Long => i32::try_from(value).is_ok(),
        }
    }
}

/// The primitive type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColumnType {
    Integer { width: IntegerWidth },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<u32>,
    },
    /// A string restricted to identifier syntax.
    Identifier,
    /// The bind-time source path of a file payload.
    Path,
    /// The bind-time source path of a payload embedded as a named stream.
    Stream,
}

impl ColumnType {
    pub const SHORT: ColumnType = ColumnType::Integer { width: IntegerWidth::Short };
    pub const LONG: ColumnType = ColumnType::Integer { width: IntegerWidth::Long };
    pub const TEXT: ColumnType = ColumnType::String { max_len: None };

    pub fn is_integer(self) -> bool {
        matches!(self, ColumnType::Integer { .. })
    }

    /// Path and stream columns name files the binder must locate.
    pub fn is_payload_source(self) -> bool {
        matches!(self, ColumnType::Path | ColumnType::Stream)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer { width } => write!(f, "i{}", width.bytes() * 8),
            ColumnType::String { max_len: Some(n) } => write!(f, "string({})", n),
            ColumnType::String { max_len: None } => write!(f, "string"),
            ColumnType::Identifier => write!(f, "identifier"),
            ColumnType::Path => write!(f, "path"),
            ColumnType::Stream => write!(f, "stream"),
        }
    }
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// The table whose (single-column) primary key this column references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            primary_key: false,
            foreign_key: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn foreign_key(mut self, table: impl Into<String>) -> Self {
        self.foreign_key = Some(table.into());
        self
    }
}
