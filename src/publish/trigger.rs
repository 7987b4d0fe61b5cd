//! Ordered publish of a new checksum.
//!
//! Steps run strictly in [`PublishStep`] order. The pointer moves only after
//! the artifact is stored and the notification goes out only after the
//! pointer moved, so every failure leaves a state that a plain rerun (or, for
//! a failed notification, a re-dispatch) recovers from.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::archive::ArchiveError;
use crate::checksum::Checksum;
use crate::error::{PipelineError, Result};
use crate::events::DispatchEvent;
use crate::notify::Notifier;
use crate::storage::{ArtifactStore, ChecksumPointerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PublishStep {
    Package,
    Upload,
    UpdatePointer,
    Notify,
}

impl PublishStep {
    /// What the operator should do when this step fails
    pub fn recovery_hint(self) -> &'static str {
        match self {
            PublishStep::Package | PublishStep::Upload => {
                "nothing was recorded; rerun the stage"
            }
            PublishStep::UpdatePointer => {
                "the artifact is stored but the pointer was not moved; rerun the stage"
            }
            PublishStep::Notify => {
                "the pointer already records this checksum; re-dispatch with trigger-deploy instead of rebuilding"
            }
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStep::Package => "package",
            PublishStep::Upload => "upload",
            PublishStep::UpdatePointer => "update-pointer",
            PublishStep::Notify => "notify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub checksum: Checksum,
    pub artifact_key: String,
    pub archive_size: usize,
    pub event_type: String,
    pub completed: Vec<PublishStep>,
}

/// Packages, uploads, records and announces one checksum
pub struct Publisher {
    artifacts: ArtifactStore,
    pointer: ChecksumPointerStore,
    notifier: Arc<dyn Notifier>,
}

impl Publisher {
    pub fn new(
        artifacts: ArtifactStore,
        pointer: ChecksumPointerStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            artifacts,
            pointer,
            notifier,
        }
    }

    /// Run every step for `checksum`. Must only be called after a `Publish` decision.
    pub async fn publish<F>(
        &self,
        checksum: &Checksum,
        build_archive: F,
        event: &DispatchEvent,
    ) -> Result<PublishReport>
    where
        F: FnOnce() -> std::result::Result<Vec<u8>, ArchiveError>,
    {
        let mut completed = Vec::with_capacity(4);

        info!("Generating dist zip for {}", checksum.short());
        let archive = build_archive().map_err(|e| failed(PublishStep::Package, e.into()))?;
        let archive_size = archive.len();
        completed.push(PublishStep::Package);

        info!("Uploading dist zip to {}", self.artifacts.key(checksum));
        self.artifacts
            .put(checksum, archive)
            .await
            .map_err(|e| failed(PublishStep::Upload, e.into()))?;
        completed.push(PublishStep::Upload);

        info!("Setting {} checksum to {}", self.pointer.kind(), checksum);
        self.pointer
            .set(checksum)
            .await
            .map_err(|e| failed(PublishStep::UpdatePointer, e.into()))?;
        completed.push(PublishStep::UpdatePointer);

        info!("Dispatching '{}'", event.event_type);
        self.notifier
            .dispatch(event)
            .await
            .map_err(|e| failed(PublishStep::Notify, e.into()))?;
        completed.push(PublishStep::Notify);

        Ok(PublishReport {
            checksum: checksum.clone(),
            artifact_key: self.artifacts.key(checksum),
            archive_size,
            event_type: event.event_type.clone(),
            completed,
        })
    }
}

fn failed(step: PublishStep, err: PipelineError) -> PipelineError {
    error!("Publish failed at {} step: {}", step, err);
    error!("Recovery: {}", step.recovery_hint());
    err
}
