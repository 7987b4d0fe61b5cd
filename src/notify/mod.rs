//! Outbound pipeline notifications
//!
//! The pipeline only knows the [`Notifier`] trait; the production
//! implementation is [`GitHubDispatcher`], which fires repository-dispatch
//! events that start the next CI workflow.

pub mod github;
pub mod mock;

pub use github::GitHubDispatcher;
pub use mock::MockNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::events::DispatchEvent;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid repository {0:?}: expected owner/repo")]
    InvalidRepository(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("dispatch rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sends a dispatch event to whatever runs the next stage
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<(), NotifyError>;
}

/// `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositorySlug {
    owner: String,
    name: String,
}

impl RepositorySlug {
    pub fn parse(raw: &str) -> Result<Self, NotifyError> {
        let invalid = || NotifyError::InvalidRepository(raw.to_string());
        let (owner, name) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositorySlug {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepositorySlug {
    type Error = NotifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepositorySlug> for String {
    fn from(slug: RepositorySlug) -> Self {
        slug.to_string()
    }
}
