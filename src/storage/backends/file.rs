//! Local directory blob store
//!
//! Mirrors the bucket layout on disk. Useful for dry runs of the pipeline
//! without cloud credentials.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::storage::{
    config::FileConfig,
    error::{StorageError, StorageResult},
    traits::BlobStore,
};

/// File-based blob store
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    /// Create a new file store, creating the base directory if needed
    pub async fn new(config: &FileConfig) -> StorageResult<Self> {
        fs::create_dir_all(&config.base_dir).await?;
        Ok(Self {
            base_dir: config.base_dir.clone(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a key onto a path below the base directory
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let mut path = self.base_dir.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\')
            {
                return Err(StorageError::invalid_key(key));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        debug!("Reading {}", path.display());
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::invalid_key(key))?;
        fs::create_dir_all(parent).await?;

        // Write next to the target and rename so readers never see a partial object
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::invalid_key(key))?;
        let partial = parent.join(format!(".{}.partial", file_name));
        fs::write(&partial, &data).await?;
        fs::rename(&partial, &path).await?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
