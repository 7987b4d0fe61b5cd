//! Mutable checksum pointers.
//!
//! Each service has two independent pointers: `last` (most recently built
//! artifact) and `live` (most recently deployed one). Writes are
//! unconditional; concurrent publishers for the same service can lose
//! updates, so callers rely on CI running one job per service at a time.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::keys::{pointer_key, LAST_CHECKSUM, LIVE_CHECKSUM};
use super::traits::BlobStore;
use crate::checksum::Checksum;
use crate::service::ServiceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Last,
    Live,
}

impl PointerKind {
    pub fn object_name(self) -> &'static str {
        match self {
            PointerKind::Last => LAST_CHECKSUM,
            PointerKind::Live => LIVE_CHECKSUM,
        }
    }
}

impl fmt::Display for PointerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerKind::Last => f.write_str("last"),
            PointerKind::Live => f.write_str("live"),
        }
    }
}

/// One named pointer of one service
#[derive(Clone)]
pub struct ChecksumPointerStore {
    store: Arc<dyn BlobStore>,
    key: String,
    kind: PointerKind,
}

impl ChecksumPointerStore {
    pub fn new(store: Arc<dyn BlobStore>, service: &ServiceId, kind: PointerKind) -> Self {
        Self {
            store,
            key: pointer_key(service, kind.object_name()),
            kind,
        }
    }

    pub fn kind(&self) -> PointerKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, `None` when the service was never published.
    ///
    /// Store failures propagate; only a missing (or blank) object is `None`.
    pub async fn get(&self) -> StorageResult<Option<Checksum>> {
        let Some(body) = self.store.get(&self.key).await? else {
            debug!("No {} checksum at {}", self.kind, self.key);
            return Ok(None);
        };

        let text = String::from_utf8(body)
            .map_err(|_| StorageError::corrupt(&self.key, "pointer is not UTF-8"))?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            warn!("Pointer {} is empty, treating as never published", self.key);
            return Ok(None);
        }

        let checksum =
            Checksum::parse(trimmed).map_err(|e| StorageError::corrupt(&self.key, e))?;
        debug!("{} checksum is {}", self.kind, checksum);
        Ok(Some(checksum))
    }

    /// Overwrite the pointer
    pub async fn set(&self, checksum: &Checksum) -> StorageResult<()> {
        self.store
            .put(&self.key, checksum.as_str().as_bytes().to_vec())
            .await?;
        debug!("Set {} to {}", self.key, checksum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBlobStore;

    const SUM: &str = "eb056704534378f374b4dc15d7761b9b2d415b68";

    fn pointer(store: &MemoryBlobStore, kind: PointerKind) -> ChecksumPointerStore {
        ChecksumPointerStore::new(
            Arc::new(store.clone()),
            &ServiceId::parse("echo").unwrap(),
            kind,
        )
    }

    #[tokio::test]
    async fn test_missing_pointer_is_absent() {
        let store = MemoryBlobStore::new();
        assert_eq!(pointer(&store, PointerKind::Last).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryBlobStore::new();
        let last = pointer(&store, PointerKind::Last);
        let checksum = Checksum::parse(SUM).unwrap();

        last.set(&checksum).await.unwrap();

        assert_eq!(last.get().await.unwrap(), Some(checksum));
        assert_eq!(store.object("echo/last-checksum").await, Some(SUM.into()));
    }

    #[tokio::test]
    async fn test_pointers_are_independent() {
        let store = MemoryBlobStore::new();
        pointer(&store, PointerKind::Last)
            .set(&Checksum::parse(SUM).unwrap())
            .await
            .unwrap();
        assert_eq!(pointer(&store, PointerKind::Live).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_body_is_trimmed() {
        let store = MemoryBlobStore::new();
        store
            .insert("echo/live-checksum", format!("{}\n", SUM.to_uppercase()))
            .await;
        let got = pointer(&store, PointerKind::Live).get().await.unwrap();
        assert_eq!(got.unwrap().as_str(), SUM);
    }

    #[tokio::test]
    async fn test_blank_body_is_absent() {
        let store = MemoryBlobStore::new();
        store.insert("echo/last-checksum", " \n").await;
        assert_eq!(pointer(&store, PointerKind::Last).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_body_is_corrupt() {
        let store = MemoryBlobStore::new();
        store.insert("echo/last-checksum", "not-a-checksum").await;
        assert!(matches!(
            pointer(&store, PointerKind::Last).get().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_absent() {
        let store = MemoryBlobStore::new();
        store.fail_gets_ending_with("last-checksum").await;
        assert!(matches!(
            pointer(&store, PointerKind::Last).get().await,
            Err(StorageError::Remote(_))
        ));
    }
}
