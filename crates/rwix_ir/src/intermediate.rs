//! Intermediates (objects and libraries).

use crate::section::Section;
use indexmap::IndexMap;
use rwix_core::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid intermediate: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A payload carried inside an intermediate for use at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadData {
    /// A file on disk, read when binding.
    Path(PathBuf),
    /// Raw bytes, hex-encoded on disk.
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// An ordered sequence of sections plus the payloads they need at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intermediate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Embedded payloads keyed by the source name rows use to refer to them.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub payloads: IndexMap<String, PayloadData>,
}

impl Intermediate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: None,
            sections: Vec::new(),
            payloads: IndexMap::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_payload(mut self, name: impl Into<String>, data: PayloadData) -> Self {
        self.payloads.insert(name.into(), data);
        self
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load an intermediate from a JSON file.
    pub fn load(path: &Path) -> Result<Self, IrError> {
        let content = std::fs::read_to_string(path).map_err(|source| IrError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| IrError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save this intermediate as JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), IrError> {
        let json = self.to_json()?;
        rwix_core::fs::atomic_write(path, json.as_bytes()).map_err(|source| IrError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use crate::section::SectionKind;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("product.wixobj");
        let intermediate = Intermediate::new("product")
            .with_platform(Platform::X64)
            .with_section(
                Section::new("main", SectionKind::Product)
                    .with_row(Row::new("Property").with("Property", "ALLUSERS").with("Value", "1")),
            )
            .with_payload("logo.ico", PayloadData::Bytes(vec![0, 1, 0xfe]));

        intermediate.save(&path).unwrap();
        let loaded = Intermediate::load(&path).unwrap();
        assert_eq!(loaded, intermediate);
    }

    #[test]
    fn test_payload_bytes_are_hex() {
        let json = serde_json::to_string(&PayloadData::Bytes(vec![0xde, 0xad])).unwrap();
        assert_eq!(json, r#"{"bytes":"dead"}"#);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wixobj");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Intermediate::load(&path), Err(IrError::Parse { .. })));
    }
}
