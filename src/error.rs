//! Top-level error type shared by every pipeline stage.
//!
//! Each concern keeps its own `thiserror` enum (`HashError`, `StorageError`,
//! `ArchiveError`, `NotifyError`, `ProcessError`); they all converge here so
//! callers can branch on [`ErrorKind`] instead of matching on messages.

use std::fmt;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::checksum::HashError;
use crate::notify::NotifyError;
use crate::storage::StorageError;
use crate::subprocess::ProcessError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checksum error: {0}")]
    Hash(#[from] HashError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Deployment failed: {0}")]
    Deploy(String),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for exit reporting and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid flag / environment variable
    Config,
    /// Local filesystem or archive failure
    Io,
    /// Artifact or pointer that must exist does not
    NotFound,
    /// Blob store or notification API failure
    Remote,
    /// External deployment tool failed
    Deploy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Remote => "remote",
            ErrorKind::Deploy => "deploy",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Hash(HashError::InvalidPattern { .. }) => ErrorKind::Config,
            Self::Hash(_) | Self::Archive(_) | Self::Io(_) => ErrorKind::Io,
            Self::Storage(err) => match err {
                StorageError::NotFound(_) => ErrorKind::NotFound,
                StorageError::Io(_) => ErrorKind::Io,
                StorageError::Configuration(_) | StorageError::InvalidKey(_) => ErrorKind::Config,
                StorageError::Remote(_) | StorageError::Corrupt { .. } => ErrorKind::Remote,
            },
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Notify(NotifyError::InvalidRepository(_)) => ErrorKind::Config,
            Self::Notify(_) => ErrorKind::Remote,
            Self::Deploy(_) | Self::Process(_) => ErrorKind::Deploy,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
