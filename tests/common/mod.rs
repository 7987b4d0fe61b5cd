//! Common test utilities and helpers
#![allow(dead_code)]

use anyhow::Result;
use backend_pipeline::notify::{MockNotifier, Notifier};
use backend_pipeline::publish::ServiceSource;
use backend_pipeline::storage::{BlobStore, MemoryBlobStore};
use backend_pipeline::subprocess::{MockProcessRunner, ProcessRunner};
use backend_pipeline::ServiceId;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const SERVICE: &str = "backend/echo";

/// Test context builder for a repository holding one service
pub struct TestContextBuilder {
    temp_dir: TempDir,
    service: String,
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl TestContextBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            service: SERVICE.to_string(),
            files: Vec::new(),
        })
    }

    pub fn with_service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }

    /// Add a file relative to the service directory
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.files
            .push((path.as_ref().to_path_buf(), content.into()));
        self
    }

    /// `.bin/app` = "A" and `serverless.yml` = "B"
    pub fn with_scenario_files(self) -> Self {
        self.with_file(".bin/app", "A").with_file("serverless.yml", "B")
    }

    pub fn build(self) -> Result<TestContext> {
        let root = self.temp_dir.path().join("repo");
        let service_dir = root.join(&self.service);
        fs::create_dir_all(&service_dir)?;

        for (path, content) in self.files {
            let full_path = service_dir.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full_path, content)?;
        }

        Ok(TestContext {
            service: ServiceId::parse(&self.service)?,
            root,
            service_dir,
            store: MemoryBlobStore::new(),
            notifier: MockNotifier::new(),
            runner: MockProcessRunner::new(),
            temp_dir: self.temp_dir,
        })
    }
}

/// A repository on disk plus in-memory collaborators
pub struct TestContext {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub service: ServiceId,
    pub service_dir: PathBuf,
    pub store: MemoryBlobStore,
    pub notifier: MockNotifier,
    pub runner: MockProcessRunner,
}

impl TestContext {
    pub fn source(&self) -> ServiceSource {
        ServiceSource::new(&self.root, self.service.clone())
    }

    pub fn blob(&self) -> Arc<dyn BlobStore> {
        Arc::new(self.store.clone())
    }

    pub fn notifier_arc(&self) -> Arc<dyn Notifier> {
        Arc::new(self.notifier.clone())
    }

    pub fn runner_arc(&self) -> Arc<dyn ProcessRunner> {
        Arc::new(self.runner.clone())
    }

    pub fn write(&self, path: &str, content: &str) {
        let full_path = self.service_dir.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }

    pub fn rename(&self, from: &str, to: &str) {
        fs::rename(self.service_dir.join(from), self.service_dir.join(to)).unwrap();
    }

    /// Number of uploaded artifacts
    pub async fn artifact_uploads(&self) -> usize {
        self.store
            .put_history()
            .await
            .iter()
            .filter(|key| key.ends_with("/dist.zip"))
            .count()
    }
}

/// Environment for running the binary against a local file store
pub fn file_store_env(store_dir: &Path) -> Vec<(&'static str, String)> {
    vec![
        ("PIPELINE_STORAGE_TYPE", "file".to_string()),
        ("PIPELINE_STORAGE_DIR", store_dir.display().to_string()),
    ]
}
