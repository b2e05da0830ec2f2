//! Locating payload sources on disk.

use lazy_static::lazy_static;
use regex::Regex;
use rwix_ir::PayloadData;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

lazy_static! {
    static ref NAMED_BIND_PATH: Regex = Regex::new(r"^!\(bindpath\.([^)]*)\)[\\/]?(.*)$").unwrap();
}

/// A directory searched for payload sources, optionally named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: PathBuf,
}

impl BindPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
        }
    }
}

/// Parses `name=path` or a bare `path`.
impl FromStr for BindPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("bind path is empty".to_string());
        }
        match s.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                Ok(BindPath::named(name, path))
            }
            Some(_) => Err(format!("invalid bind path '{}', expected name=path", s)),
            None => Ok(BindPath::new(s)),
        }
    }
}

impl fmt::Display for BindPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{}={}", name, self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Where a payload's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    Embedded(Vec<u8>),
    File(PathBuf),
}

/// The outcome of searching for one source: where it was found, or every
/// path that was tried.
pub(crate) fn locate(
    source: &str,
    payloads: &IndexMap<String, PayloadData>,
    bind_paths: &[BindPath],
) -> Result<Located, Vec<PathBuf>> {
    match payloads.get(source) {
        Some(PayloadData::Bytes(bytes)) => return Ok(Located::Embedded(bytes.clone())),
        Some(PayloadData::Path(path)) => {
            return if path.is_file() {
                Ok(Located::File(path.clone()))
            } else {
                Err(vec![path.clone()])
            };
        }
        None => {}
    }

    let candidates: Vec<PathBuf> = if let Some(caps) = NAMED_BIND_PATH.captures(source) {
        let name = &caps[1];
        let rest = &caps[2];
        bind_paths
            .iter()
            .filter(|b| b.name.as_deref() == Some(name))
            .map(|b| b.path.join(rest))
            .collect()
    } else if Path::new(source).is_absolute() || bind_paths.is_empty() {
        vec![PathBuf::from(source)]
    } else {
        bind_paths.iter().map(|b| b.path.join(source)).collect()
    };

    match candidates.iter().find(|c| c.is_file()) {
        Some(found) => Ok(Located::File(found.clone())),
        None => Err(candidates),
    }
}
