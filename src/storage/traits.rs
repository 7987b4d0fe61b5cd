//! Core trait definition for the blob storage layer

use async_trait::async_trait;

use super::error::StorageResult;

/// Flat key/value object store (S3 bucket, local directory, memory).
///
/// Implementations must report a missing key as `Ok(None)` and reserve `Err`
/// for failures (network, auth, I/O), so "never published" stays
/// distinguishable from "could not ask".
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object, `None` if the key does not exist
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store an object, replacing any previous value
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
