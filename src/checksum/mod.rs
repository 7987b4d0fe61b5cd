//! Content checksums for service source trees.
//!
//! A [`Checksum`] is the lowercase hex SHA-1 of a directory walk (see
//! [`DirectoryHasher`]). It doubles as the content address of the service's
//! dist archive, so it is validated before it is ever used in a storage key.

pub mod hasher;

pub use hasher::{hash_directory, DirectoryHasher, HashError, DEFAULT_EXCLUDES};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid checksum {value:?}: expected 40 hex digits")]
pub struct InvalidChecksum {
    pub value: String,
}

/// Deterministic fingerprint of a service tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Length of the hex rendering of a 160-bit digest
    pub const HEX_LEN: usize = 40;

    pub fn parse(raw: &str) -> Result<Self, InvalidChecksum> {
        let value = raw.trim();
        if value.len() != Self::HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidChecksum {
                value: raw.to_string(),
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub(crate) fn from_hex_digest(hex: String) -> Self {
        debug_assert_eq!(hex.len(), Self::HEX_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Checksum {
    type Err = InvalidChecksum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = InvalidChecksum;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
