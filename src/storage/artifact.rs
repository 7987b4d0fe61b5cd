//! Content-addressed dist archives.

use std::sync::Arc;
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::keys::artifact_key;
use super::traits::BlobStore;
use crate::checksum::Checksum;
use crate::service::ServiceId;

/// Dist archives of one service, addressed by checksum
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn BlobStore>,
    service: ServiceId,
}

impl ArtifactStore {
    pub fn new(store: Arc<dyn BlobStore>, service: ServiceId) -> Self {
        Self { store, service }
    }

    pub fn key(&self, checksum: &Checksum) -> String {
        artifact_key(&self.service, checksum)
    }

    /// Upload unconditionally; re-uploading the same checksum is harmless
    pub async fn put(&self, checksum: &Checksum, archive: Vec<u8>) -> StorageResult<()> {
        let key = self.key(checksum);
        let size = archive.len();
        self.store.put(&key, archive).await?;
        info!(
            "Uploaded {} bytes to {} ({})",
            size,
            key,
            self.store.backend_name()
        );
        Ok(())
    }

    /// Download an archive. A missing archive is [`StorageError::NotFound`].
    pub async fn get(&self, checksum: &Checksum) -> StorageResult<Vec<u8>> {
        let key = self.key(checksum);
        match self.store.get(&key).await? {
            Some(bytes) => {
                debug!("Downloaded {} bytes from {}", bytes.len(), key);
                Ok(bytes)
            }
            None => Err(StorageError::not_found(format!(
                "no artifact for {} at checksum {} ({})",
                self.service, checksum, key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBlobStore;

    fn artifacts(store: &MemoryBlobStore) -> ArtifactStore {
        ArtifactStore::new(
            Arc::new(store.clone()),
            ServiceId::parse("backend/echo").unwrap(),
        )
    }

    fn checksum() -> Checksum {
        Checksum::parse("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap()
    }

    #[tokio::test]
    async fn test_put_uses_content_address() {
        let store = MemoryBlobStore::new();
        artifacts(&store).put(&checksum(), b"zip".to_vec()).await.unwrap();

        assert_eq!(
            store.put_history().await,
            vec!["backend/echo/da39a3ee5e6b4b0d3255bfef95601890afd80709/dist.zip"]
        );
        assert_eq!(
            artifacts(&store).get(&checksum()).await.unwrap(),
            b"zip".to_vec()
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = artifacts(&store).get(&checksum()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("backend/echo"));
    }
}
