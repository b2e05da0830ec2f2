//! Payload containers (cabinets).
//!
//! Layout: magic, compression tag, entry count, then per entry its name,
//! size and SHA-256 digest, followed by every member's bytes in entry order.
//! Members are stored; the compression level is carried as metadata so the
//! declared level survives a round trip.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{BackendError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const CONTAINER_MAGIC: &[u8; 8] = b"RWIXCAB1";

/// Declared compression level of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    None,
    Low,
    Medium,
    High,
    #[default]
    Mszip,
}

impl CompressionLevel {
    fn tag(self) -> u8 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Low => 1,
            CompressionLevel::Medium => 2,
            CompressionLevel::High => 3,
            CompressionLevel::Mszip => 4,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionLevel::None),
            1 => Some(CompressionLevel::Low),
            2 => Some(CompressionLevel::Medium),
            3 => Some(CompressionLevel::High),
            4 => Some(CompressionLevel::Mszip),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionLevel::None => "none",
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
            CompressionLevel::Mszip => "mszip",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionLevel::None),
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            "mszip" => Ok(CompressionLevel::Mszip),
            _ => Err(format!("unknown compression level '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub compression: CompressionLevel,
    pub entries: Vec<ContainerEntry>,
}

impl Container {
    pub fn new(compression: CompressionLevel) -> Self {
        Self {
            compression,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.entries.push(ContainerEntry {
            name: name.into(),
            data,
        });
    }

    pub fn get(&self, name: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.bytes(CONTAINER_MAGIC);
        w.u8(self.compression.tag());
        w.uleb128(self.entries.len());
        for entry in &self.entries {
            w.str(&entry.name);
            w.u64(entry.data.len() as u64);
            w.bytes(&Sha256::digest(&entry.data));
        }
        for entry in &self.entries {
            w.bytes(&entry.data);
        }
        w.finish()
    }

    /// Decode a container, verifying every member's digest.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        if r.take(CONTAINER_MAGIC.len())? != CONTAINER_MAGIC {
            return Err(BackendError::malformed("not a payload container"));
        }
        let tag = r.u8()?;
        let compression = CompressionLevel::from_tag(tag)
            .ok_or_else(|| BackendError::malformed(format!("unknown compression tag {}", tag)))?;

        let count = r.uleb128()?;
        let mut headers = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            let name = r.str()?.to_string();
            let size = usize::try_from(r.u64()?)
                .map_err(|_| BackendError::malformed("member size overflows"))?;
            let digest = r.take(32)?;
            headers.push((name, size, digest));
        }

        let mut entries = Vec::with_capacity(headers.len());
        for (name, size, digest) in headers {
            let data = r.take(size)?;
            if Sha256::digest(data).as_slice() != digest {
                return Err(BackendError::malformed(format!(
                    "digest mismatch for member '{}' (expected {})",
                    name,
                    hex::encode(digest)
                )));
            }
            entries.push(ContainerEntry {
                name,
                data: data.to_vec(),
            });
        }
        r.expect_end()?;

        Ok(Self {
            compression,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Container {
        let mut container = Container::new(CompressionLevel::High);
        container.push("readme", b"read me".to_vec());
        container.push("empty", Vec::new());
        container
    }

    #[test]
    fn test_decode_encoded() {
        let container = sample();
        let decoded = Container::decode(&container.encode()).unwrap();
        assert_eq!(decoded, container);
        assert_eq!(decoded.get("readme").unwrap().data, b"read me");
    }

    #[test]
    fn test_corrupted_member_is_rejected() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = Container::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn test_bad_magic() {
        assert!(Container::decode(b"NOTACAB!\0\0").is_err());
    }

    #[test]
    fn test_compression_level_parse() {
        assert_eq!("MSZIP".parse::<CompressionLevel>(), Ok(CompressionLevel::Mszip));
        assert!("ultra".parse::<CompressionLevel>().is_err());
    }
}
