//! Service identifiers.
//!
//! A service id is both the service's directory (relative to the repository
//! root) and the namespace of its objects in the blob store, so it has to be a
//! plain relative path: `/`-separated, no empty, `.` or `..` segments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid service id {value:?}: {reason}")]
pub struct InvalidServiceId {
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    pub fn parse(raw: &str) -> Result<Self, InvalidServiceId> {
        let invalid = |reason| InvalidServiceId {
            value: raw.to_string(),
            reason,
        };

        let value = raw.trim().trim_end_matches('/');
        if value.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if value.starts_with('/') {
            return Err(invalid("must be relative"));
        }
        if value.contains('\\') {
            return Err(invalid("must use '/' as separator"));
        }
        for segment in value.split('/') {
            match segment {
                "" => return Err(invalid("contains an empty path segment")),
                "." | ".." => return Err(invalid("contains a '.' or '..' segment")),
                _ if segment.chars().any(char::is_control) => {
                    return Err(invalid("contains control characters"))
                }
                _ => {}
            }
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory holding the service sources below `root`
    pub fn dir(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceId {
    type Err = InvalidServiceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = InvalidServiceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceId> for String {
    fn from(service: ServiceId) -> Self {
        service.0
    }
}
