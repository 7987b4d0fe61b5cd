//! # backend-pipeline
//!
//! Checksum-gated build, publish and deploy stages for a multi-service
//! serverless backend.
//!
//! ## Usage
//!
//! ```bash
//! backend-pipeline hash --service backend/echo --commit-sha "$GITHUB_SHA"
//! backend-pipeline build --service backend/echo
//! backend-pipeline trigger-deploy --service backend/echo --env prod
//! backend-pipeline deploy --service backend/echo --env prod --checksum <sha1>
//! ```
//!
//! ## Modules
//!
//! - `checksum` - Deterministic SHA-1 fingerprint of a service directory
//! - `storage` - Blob store backends, checksum pointers and content-addressed artifacts
//! - `archive` - Dist zip packaging and path-checked extraction
//! - `events` - Build and deploy event payloads
//! - `notify` - Repository-dispatch notifications
//! - `subprocess` - Process runner used to invoke the deployment tool
//! - `publish` - Publish decision, ordered publish steps and the pipeline stages
//! - `config` - Environment-sourced configuration, validated up front
//! - `error` - Pipeline error type and its classification
pub mod archive;
pub mod checksum;
pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod publish;
pub mod service;
pub mod storage;
pub mod subprocess;

pub use checksum::{Checksum, DirectoryHasher};
pub use error::{ErrorKind, PipelineError, Result};
pub use service::ServiceId;
