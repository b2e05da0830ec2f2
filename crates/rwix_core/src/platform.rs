//! Target platform of an installer database.
//!
//! The platform is recorded in the database summary's Template property as
//! `<platform>;<languages>` and decides the schema version written to the
//! PageCount property.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The target architecture an artifact is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X86,
    X64,
    Arm64,
    Arm,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown platform '{0}', expected one of x86, x64, arm64, arm")]
pub struct ParsePlatformError(pub String);

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::X86, Platform::X64, Platform::Arm64, Platform::Arm];

    /// The platform name as written in the Template summary property.
    pub fn template_name(self) -> &'static str {
        match self {
            Platform::X86 => "Intel",
            Platform::X64 => "x64",
            Platform::Arm64 => "Arm64",
            Platform::Arm => "Arm",
        }
    }

    /// The database schema version recorded for this platform.
    pub fn schema_version(self) -> u32 {
        match self {
            Platform::X86 => 200,
            Platform::X64 | Platform::Arm64 | Platform::Arm => 500,
        }
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, Platform::X64 | Platform::Arm64)
    }

    /// Build the Template summary value for this platform.
    pub fn to_template(self, languages: &str) -> String {
        format!("{};{}", self.template_name(), languages)
    }

    /// Read the platform out of a Template summary value.
    ///
    /// Only the part before the first `;` is considered. Empty, absent or
    /// unrecognized values (including `Intel64`) yield `None`.
    pub fn from_template(template: &str) -> Option<Platform> {
        let name = template.split(';').next().unwrap_or("").trim();
        if name.eq_ignore_ascii_case("intel") {
            Some(Platform::X86)
        } else if name.eq_ignore_ascii_case("x64") || name.eq_ignore_ascii_case("amd64") {
            Some(Platform::X64)
        } else if name.eq_ignore_ascii_case("arm64") {
            Some(Platform::Arm64)
        } else if name.eq_ignore_ascii_case("arm") {
            Some(Platform::Arm)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::X86 => write!(f, "x86"),
            Platform::X64 => write!(f, "x64"),
            Platform::Arm64 => write!(f, "arm64"),
            Platform::Arm => write!(f, "arm"),
        }
    }
}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "intel" => Ok(Platform::X86),
            "x64" | "amd64" => Ok(Platform::X64),
            "arm64" => Ok(Platform::Arm64),
            "arm" => Ok(Platform::Arm),
            _ => Err(ParsePlatformError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trip() {
        for platform in Platform::ALL {
            let template = platform.to_template("1033");
            assert_eq!(Platform::from_template(&template), Some(platform));
        }
    }

    #[test]
    fn test_from_template_unrecognized() {
        assert_eq!(Platform::from_template(""), None);
        assert_eq!(Platform::from_template(";1033"), None);
        assert_eq!(Platform::from_template("Intel64;1033"), None);
        assert_eq!(Platform::from_template("garbage"), None);
    }

    #[test]
    fn test_from_template_accepts_amd64() {
        assert_eq!(Platform::from_template("AMD64;0"), Some(Platform::X64));
    }

    #[test]
    fn test_parse() {
        assert_eq!("X64".parse::<Platform>(), Ok(Platform::X64));
        assert!("itanium".parse::<Platform>().is_err());
    }
}
