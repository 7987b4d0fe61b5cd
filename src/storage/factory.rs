//! Storage factory for creating blob store instances

use std::sync::Arc;

use super::backends::{FileBlobStore, MemoryBlobStore};
#[cfg(feature = "s3")]
use super::backends::S3BlobStore;
use super::config::{BackendConfig, StorageConfig};
use super::error::StorageResult;
use super::traits::BlobStore;

/// Factory for creating blob stores
pub struct StorageFactory;

impl StorageFactory {
    /// Create a blob store from explicit configuration
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
        match &config.backend_config {
            BackendConfig::File(file_config) => {
                let store = FileBlobStore::new(file_config).await?;
                Ok(Arc::new(store))
            }
            BackendConfig::Memory => Ok(Arc::new(MemoryBlobStore::new())),
            #[cfg(feature = "s3")]
            BackendConfig::S3(s3_config) => {
                let store = S3BlobStore::new(s3_config).await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "s3"))]
            BackendConfig::S3(_) => Err(super::error::StorageError::configuration(
                "S3 backend not enabled. Enable with --features s3",
            )),
        }
    }
}
