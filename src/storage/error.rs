//! Error types for the blob storage layer

use std::fmt;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
///
/// A missing object is *not* an error at the [`BlobStore`](super::BlobStore)
/// level (`get` returns `None`); `NotFound` is raised by callers that require
/// the object, such as artifact downloads.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local I/O failed (file backend)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote store rejected or failed the request
    #[error("Remote storage error: {0}")]
    Remote(String),

    /// Required object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored object exists but cannot be interpreted
    #[error("Corrupt object at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key cannot be mapped onto the backend safely
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Create a remote error
    pub fn remote<E: fmt::Display>(msg: E) -> Self {
        Self::Remote(msg.to_string())
    }

    /// Create a not found error
    pub fn not_found<E: fmt::Display>(item: E) -> Self {
        Self::NotFound(item.to_string())
    }

    /// Create a corrupt object error
    pub fn corrupt<K: fmt::Display, E: fmt::Display>(key: K, reason: E) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create an invalid key error
    pub fn invalid_key<E: fmt::Display>(key: E) -> Self {
        Self::InvalidKey(key.to_string())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
