// ABOUTME: Validated artifact version string.
// ABOUTME: Accepts image-tag style versions like v1.2.3, 2024.01-rc1, or sha-abc123.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version cannot be empty")]
    Empty,

    #[error("version exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("version cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in version: '{0}'")]
    InvalidChar(char),
}

/// An opaque deployable version.
///
/// Uses the character set of an OCI image tag so the value can be substituted
/// into deploy commands without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(String);

impl Version {
    pub fn new(value: &str) -> Result<Self, VersionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(VersionError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(VersionError::TooLong);
        }

        if let Some(first) = value.chars().next()
            && (first == '.' || first == '-')
        {
            return Err(VersionError::InvalidStart(first));
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' && c != '+' {
                return Err(VersionError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::new(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::new(&s).map_err(serde::de::Error::custom)
    }
}
