//! Typed column values.

use lazy_static::lazy_static;
use regex::Regex;
use rwix_schema::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
}

/// Whether `s` is a valid identifier (letters, digits, `_` and `.`, not
/// starting with a digit or `.`).
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// A non-null column value. Absent columns are null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    String(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::String(_) => None,
        }
    }

    /// Check this value against a column type, describing the problem if it
    /// does not conform.
    pub fn check(&self, ty: ColumnType) -> Result<(), String> {
        match (ty, self) {
            (ColumnType::Integer { width }, Value::Integer(n)) => {
                if width.fits(*n) {
                    Ok(())
                } else {
                    Err(format!("{} does not fit in a {} column", n, ty))
                }
            }
            (ColumnType::Integer { .. }, Value::String(s)) => {
                Err(format!("expected an integer, found string '{}'", s))
            }
            (ColumnType::String { max_len }, Value::String(s)) => match max_len {
                Some(max) if s.chars().count() > max as usize => {
                    Err(format!("string is longer than {} characters", max))
                }
                _ => Ok(()),
            },
            (ColumnType::Identifier, Value::String(s)) => {
                if is_identifier(s) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not a valid identifier", s))
                }
            }
            (ColumnType::Path | ColumnType::Stream, Value::String(s)) => {
                if s.is_empty() {
                    Err("source path is empty".to_string())
                } else {
                    Ok(())
                }
            }
            (_, Value::Integer(n)) => Err(format!("expected a {} value, found integer {}", ty, n)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
