//! Change detection and the publish/deploy protocol
//!
//! A run computes the service checksum, compares it with the stored pointer
//! exactly once ([`decide`]) and only on [`Decision::Publish`] touches
//! storage or sends notifications. Build-side stages gate on the `last`
//! pointer; the deploy side records `live` after the deployment tool succeeds.
//!
//! There is no locking: two concurrent runs for the same service can both
//! decide to publish and the later pointer write wins. CI is expected to
//! serialize runs per service.

pub mod decision;
pub mod deploy;
pub mod stages;
pub mod trigger;

pub use decision::{decide, Decision};
pub use deploy::{DeployReport, Deployer};
pub use stages::{
    build_stage, deploy_stage, hash_stage, trigger_deploy_stage, BuildOutcome, ChecksumSource,
    HashOutcome, ServiceSource,
};
pub use trigger::{PublishReport, PublishStep, Publisher};
