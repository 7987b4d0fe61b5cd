//! In-memory blob store for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{
    error::{StorageError, StorageResult},
    traits::BlobStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Get,
    Put,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: Operation,
    key_suffix: String,
}

/// In-memory blob store for testing
///
/// Clones share state, so a test can keep one handle for assertions while the
/// pipeline owns another.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    put_history: Arc<RwLock<Vec<String>>>,
    failures: Arc<RwLock<Vec<InjectedFailure>>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording it as a put
    pub async fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert(key.to_string(), data.into());
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys of every successful `put`, in call order
    pub async fn put_history(&self) -> Vec<String> {
        self.put_history.read().await.clone()
    }

    /// Make every `put` to a key ending in `suffix` fail with a remote error
    pub async fn fail_puts_ending_with(&self, suffix: &str) {
        self.inject(Operation::Put, suffix).await;
    }

    /// Make every `get` of a key ending in `suffix` fail with a remote error
    pub async fn fail_gets_ending_with(&self, suffix: &str) {
        self.inject(Operation::Get, suffix).await;
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    async fn inject(&self, operation: Operation, suffix: &str) {
        self.failures.write().await.push(InjectedFailure {
            operation,
            key_suffix: suffix.to_string(),
        });
    }

    async fn check_failure(&self, operation: Operation, key: &str) -> StorageResult<()> {
        let failures = self.failures.read().await;
        if failures
            .iter()
            .any(|f| f.operation == operation && key.ends_with(&f.key_suffix))
        {
            return Err(StorageError::remote(format!(
                "injected {:?} failure for {}",
                operation, key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_failure(Operation::Get, key).await?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.check_failure(Operation::Put, key).await?;
        self.objects.write().await.insert(key.to_string(), data);
        self.put_history.write().await.push(key.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
