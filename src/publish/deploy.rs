//! Deploy side: fetch an artifact, run the deployment tool, record `live`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::archive;
use crate::checksum::Checksum;
use crate::error::{PipelineError, Result};
use crate::storage::{ArtifactStore, ChecksumPointerStore};
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub checksum: Checksum,
    pub env: String,
    /// Where the archive was unpacked; gone once a temporary directory is dropped
    pub dist_dir: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

/// Downloads, unpacks and deploys artifacts of one service
pub struct Deployer {
    artifacts: ArtifactStore,
    live: ChecksumPointerStore,
    runner: Arc<dyn ProcessRunner>,
    tool: String,
    timeout: Option<Duration>,
}

impl Deployer {
    pub fn new(
        artifacts: ArtifactStore,
        live: ChecksumPointerStore,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            artifacts,
            live,
            runner,
            tool: crate::config::DEFAULT_DEPLOY_TOOL.to_string(),
            timeout: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deploy `checksum` to `env`. The live pointer moves only when the tool exits 0.
    ///
    /// With `dist_dir` the archive is unpacked there (the directory must be
    /// empty or absent); otherwise a temporary directory is used and removed
    /// afterwards.
    pub async fn deploy(
        &self,
        env: &str,
        checksum: &Checksum,
        dist_dir: Option<&Path>,
    ) -> Result<DeployReport> {
        info!("Downloading dist zip {}", self.artifacts.key(checksum));
        let bytes = self.artifacts.get(checksum).await?;

        let (_scratch, dir) = prepare_dist_dir(dist_dir)?;
        info!("Unzipping dist zip into {}", dir.display());
        archive::extract(&bytes, &dir)?;

        let command = ProcessCommandBuilder::new(&self.tool)
            .args(["deploy", "--stage", env])
            .current_dir(&dir)
            .timeout(self.timeout)
            .build();
        info!("Running {}", command.display());
        let output = self.runner.run(command).await?;

        for line in output.stdout.lines() {
            info!("{}", line);
        }
        for line in output.stderr.lines() {
            warn!("{}", line);
        }

        if let Err(e) = output.status.check() {
            return Err(PipelineError::Deploy(format!(
                "{} deploy --stage {} failed: {}; live checksum left unchanged",
                self.tool, env, e
            )));
        }

        info!("Setting {} checksum to {}", self.live.kind(), checksum);
        self.live.set(checksum).await?;

        Ok(DeployReport {
            checksum: checksum.clone(),
            env: env.to_string(),
            dist_dir: dir,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn prepare_dist_dir(requested: Option<&Path>) -> Result<(Option<TempDir>, PathBuf)> {
    match requested {
        Some(dir) => {
            if dir.exists() && std::fs::read_dir(dir)?.next().is_some() {
                return Err(PipelineError::config(format!(
                    "dist directory {} is not empty",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)?;
            Ok((None, dir.to_path_buf()))
        }
        None => {
            let scratch = tempfile::Builder::new().prefix("dist-").tempdir()?;
            let dir = scratch.path().to_path_buf();
            Ok((Some(scratch), dir))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::service::ServiceId;
    use crate::storage::{BlobStore, MemoryBlobStore, PointerKind};
    use crate::subprocess::MockProcessRunner;

    const SUM: &str = "eb056704534378f374b4dc15d7761b9b2d415b68";

    fn deployer(store: &MemoryBlobStore, runner: &MockProcessRunner) -> Deployer {
        let blob: Arc<dyn BlobStore> = Arc::new(store.clone());
        let service = ServiceId::parse("echo").unwrap();
        Deployer::new(
            ArtifactStore::new(blob.clone(), service.clone()),
            ChecksumPointerStore::new(blob, &service, PointerKind::Live),
            Arc::new(runner.clone()),
        )
    }

    async fn seed_artifact(store: &MemoryBlobStore) {
        let src = TempDir::new().unwrap();
        std::fs::create_dir(src.path().join(".bin")).unwrap();
        std::fs::write(src.path().join(".bin/app"), "A").unwrap();
        std::fs::write(src.path().join("serverless.yml"), "B").unwrap();
        let bytes = archive::build_dist_zip(src.path()).unwrap();
        store.insert(&format!("echo/{}/dist.zip", SUM), bytes).await;
    }

    #[tokio::test]
    async fn test_success_sets_live() {
        let store = MemoryBlobStore::new();
        seed_artifact(&store).await;
        let runner = MockProcessRunner::new();
        runner
            .expect_command("serverless")
            .with_args(|args| args == ["deploy", "--stage", "prod"])
            .returns_stdout("Service deployed")
            .finish();

        let dist = TempDir::new().unwrap();
        let dist_dir = dist.path().join("dist");
        let report = deployer(&store, &runner)
            .deploy("prod", &Checksum::parse(SUM).unwrap(), Some(dist_dir.as_path()))
            .await
            .unwrap();

        assert_eq!(report.stdout, "Service deployed");
        assert!(report.dist_dir.join("serverless.yml").is_file());
        assert_eq!(store.object("echo/live-checksum").await, Some(SUM.into()));

        let calls = runner.get_call_history();
        assert_eq!(calls[0].working_dir.as_deref(), Some(report.dist_dir.as_path()));
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_live() {
        let store = MemoryBlobStore::new();
        seed_artifact(&store).await;
        let runner = MockProcessRunner::new();
        runner
            .expect_command("serverless")
            .returns_exit_code(1)
            .returns_stderr("CloudFormation rollback")
            .finish();

        let err = deployer(&store, &runner)
            .deploy("dev", &Checksum::parse(SUM).unwrap(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Deploy);
        assert_eq!(store.object("echo/live-checksum").await, None);
    }

    #[tokio::test]
    async fn test_missing_tool_keeps_live() {
        let store = MemoryBlobStore::new();
        seed_artifact(&store).await;
        let runner = MockProcessRunner::new();
        runner.expect_command("sls").not_found().finish();

        let err = deployer(&store, &runner)
            .with_tool("sls")
            .deploy("dev", &Checksum::parse(SUM).unwrap(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Deploy);
        assert!(store.put_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let store = MemoryBlobStore::new();
        let runner = MockProcessRunner::new();

        let err = deployer(&store, &runner)
            .deploy("dev", &Checksum::parse(SUM).unwrap(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(runner.get_call_history().is_empty());
    }

    #[tokio::test]
    async fn test_non_empty_dist_dir_is_rejected() {
        let store = MemoryBlobStore::new();
        seed_artifact(&store).await;
        let runner = MockProcessRunner::new();
        let dist = TempDir::new().unwrap();
        std::fs::write(dist.path().join("stale.zip"), "old").unwrap();

        let err = deployer(&store, &runner)
            .deploy("dev", &Checksum::parse(SUM).unwrap(), Some(dist.path()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(runner.get_call_history().is_empty());
    }
}
