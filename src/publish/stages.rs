//! The pipeline stages behind each CLI subcommand.
//!
//! Stages take their collaborators as arguments so the binary can wire real
//! backends while tests pass in-memory ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::decision::{decide, Decision};
use super::deploy::{DeployReport, Deployer};
use super::trigger::{PublishReport, Publisher};
use crate::archive;
use crate::checksum::{Checksum, DirectoryHasher};
use crate::config::RuntimeSettings;
use crate::error::{PipelineError, Result};
use crate::events::{BuildEvent, DeployEvent, DispatchEvent};
use crate::notify::{Notifier, NotifyError};
use crate::service::ServiceId;
use crate::storage::{ArtifactStore, BlobStore, ChecksumPointerStore, PointerKind};
use crate::subprocess::ProcessRunner;

/// A service directory plus the globs left out of its checksum
#[derive(Debug, Clone)]
pub struct ServiceSource {
    pub root: PathBuf,
    pub service: ServiceId,
    /// Added to the default `.bin/*` exclusion
    pub extra_excludes: Vec<String>,
}

impl ServiceSource {
    pub fn new(root: impl Into<PathBuf>, service: ServiceId) -> Self {
        Self {
            root: root.into(),
            service,
            extra_excludes: Vec::new(),
        }
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.extra_excludes = excludes;
        self
    }

    pub fn dir(&self) -> PathBuf {
        self.service.dir(&self.root)
    }

    pub fn checksum(&self) -> Result<Checksum> {
        let dir = self.dir();
        info!("Computing checksum of {}", dir.display());
        let checksum = DirectoryHasher::with_default_excludes(&self.extra_excludes)?.hash(&dir)?;
        info!("Checksum: {}", checksum);
        Ok(checksum)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutcome {
    pub checksum: Checksum,
    pub decision: Decision,
    /// Event type of the build event, when one was sent
    pub dispatched: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub checksum: Checksum,
    pub decision: Decision,
    pub report: Option<PublishReport>,
}

/// Where trigger-deploy gets the checksum to announce
pub enum ChecksumSource {
    Explicit(Checksum),
    LastPointer(ChecksumPointerStore),
}

impl ChecksumSource {
    pub async fn resolve(&self, service: &ServiceId) -> Result<Checksum> {
        match self {
            ChecksumSource::Explicit(checksum) => Ok(checksum.clone()),
            ChecksumSource::LastPointer(pointer) => pointer.get().await?.ok_or_else(|| {
                PipelineError::not_found(format!(
                    "no {} checksum recorded for {}; has it been built?",
                    pointer.kind(),
                    service
                ))
            }),
        }
    }
}

async fn stored_checksum(pointer: &ChecksumPointerStore) -> Result<Option<Checksum>> {
    let stored = pointer.get().await?;
    match &stored {
        Some(checksum) => info!("{} checksum: {}", pointer.kind(), checksum),
        None => info!("No {} checksum recorded yet", pointer.kind()),
    }
    Ok(stored)
}

/// Decide whether `source` changed since the last build and, if so, request one.
///
/// Never writes to storage.
pub async fn hash_stage(
    source: &ServiceSource,
    commit_sha: &str,
    store: Arc<dyn BlobStore>,
    notifier: &dyn Notifier,
) -> Result<HashOutcome> {
    let checksum = source.checksum()?;
    let last = ChecksumPointerStore::new(store, &source.service, PointerKind::Last);
    let decision = decide(&checksum, stored_checksum(&last).await?.as_ref());

    if decision == Decision::Skip {
        info!("{} is up to date, nothing to do", source.service);
        return Ok(HashOutcome {
            checksum,
            decision,
            dispatched: None,
        });
    }

    let event = DispatchEvent::try_from(&BuildEvent::new(source.service.clone(), commit_sha))
        .map_err(NotifyError::from)?;
    info!("Dispatching '{}'", event.event_type);
    notifier.dispatch(&event).await?;

    Ok(HashOutcome {
        checksum,
        decision,
        dispatched: Some(event.event_type),
    })
}

/// Package and publish `source` when its checksum differs from `last`, then
/// request a deployment to `env`.
pub async fn build_stage(
    source: &ServiceSource,
    env: &str,
    store: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
) -> Result<BuildOutcome> {
    let checksum = source.checksum()?;
    let last = ChecksumPointerStore::new(store.clone(), &source.service, PointerKind::Last);
    let decision = decide(&checksum, stored_checksum(&last).await?.as_ref());

    if decision == Decision::Skip {
        info!("{} at {} is already built, nothing to do", source.service, checksum.short());
        return Ok(BuildOutcome {
            checksum,
            decision,
            report: None,
        });
    }

    let event = DispatchEvent::try_from(&DeployEvent::new(
        source.service.clone(),
        env,
        checksum.clone(),
    ))
    .map_err(NotifyError::from)?;
    let publisher = Publisher::new(
        ArtifactStore::new(store, source.service.clone()),
        last,
        notifier,
    );
    let dir = source.dir();
    let report = publisher
        .publish(&checksum, || archive::build_dist_zip(&dir), &event)
        .await?;

    Ok(BuildOutcome {
        checksum,
        decision,
        report: Some(report),
    })
}

/// Request a deployment of an existing artifact without rebuilding
pub async fn trigger_deploy_stage(
    service: &ServiceId,
    env: &str,
    source: &ChecksumSource,
    notifier: &dyn Notifier,
) -> Result<DispatchEvent> {
    let checksum = source.resolve(service).await?;
    let event = DispatchEvent::try_from(&DeployEvent::new(service.clone(), env, checksum))
        .map_err(NotifyError::from)?;
    info!("Dispatching '{}'", event.event_type);
    notifier.dispatch(&event).await?;
    Ok(event)
}

/// Deploy the artifact for `checksum` and record it as live
pub async fn deploy_stage(
    service: &ServiceId,
    env: &str,
    checksum: &Checksum,
    dist_dir: Option<&Path>,
    store: Arc<dyn BlobStore>,
    runner: Arc<dyn ProcessRunner>,
    runtime: &RuntimeSettings,
) -> Result<DeployReport> {
    info!("Deploying {} at {} to {}", service, checksum.short(), env);
    let deployer = Deployer::new(
        ArtifactStore::new(store.clone(), service.clone()),
        ChecksumPointerStore::new(store, service, PointerKind::Live),
        runner,
    )
    .with_tool(runtime.deploy_tool.clone())
    .with_timeout(runtime.deploy_timeout);

    deployer.deploy(env, checksum, dist_dir).await
}
