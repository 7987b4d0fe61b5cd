//! Repository-dispatch events emitted by the pipeline
//!
//! A build event asks CI to build a service at a commit; a deploy event asks
//! CI to deploy an already uploaded artifact to an environment. The payload
//! field names are consumed by workflow files, so they are part of the wire
//! format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::service::ServiceId;

/// Payload of `backend-build {service}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    #[serde(rename = "commitSHA")]
    pub commit_sha: String,
    pub service: ServiceId,
}

/// Payload of `backend-deploy {service} @ {env}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEvent {
    pub env: String,
    pub service: ServiceId,
    pub checksum: Checksum,
}

impl BuildEvent {
    pub fn new(service: ServiceId, commit_sha: impl Into<String>) -> Self {
        Self {
            commit_sha: commit_sha.into(),
            service,
        }
    }

    pub fn event_type(&self) -> String {
        format!("backend-build {}", self.service)
    }
}

impl DeployEvent {
    pub fn new(service: ServiceId, env: impl Into<String>, checksum: Checksum) -> Self {
        Self {
            env: env.into(),
            service,
            checksum,
        }
    }

    pub fn event_type(&self) -> String {
        format!("backend-deploy {} @ {}", self.service, self.env)
    }
}

/// Event type plus JSON payload, ready to hand to a notifier
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub event_type: String,
    pub payload: Value,
}

impl DispatchEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

impl TryFrom<&BuildEvent> for DispatchEvent {
    type Error = serde_json::Error;

    fn try_from(event: &BuildEvent) -> Result<Self, Self::Error> {
        Ok(Self::new(event.event_type(), serde_json::to_value(event)?))
    }
}

impl TryFrom<&DeployEvent> for DispatchEvent {
    type Error = serde_json::Error;

    fn try_from(event: &DeployEvent) -> Result<Self, Self::Error> {
        Ok(Self::new(event.event_type(), serde_json::to_value(event)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> ServiceId {
        ServiceId::parse("backend/echo").unwrap()
    }

    #[test]
    fn test_build_event_wire_format() {
        let event = BuildEvent::new(service(), "0a1b2c");
        let dispatch = DispatchEvent::try_from(&event).unwrap();

        assert_eq!(dispatch.event_type, "backend-build backend/echo");
        assert_eq!(
            dispatch.payload,
            json!({"commitSHA": "0a1b2c", "service": "backend/echo"})
        );
    }

    #[test]
    fn test_deploy_event_wire_format() {
        let checksum = Checksum::parse("eb056704534378f374b4dc15d7761b9b2d415b68").unwrap();
        let event = DeployEvent::new(service(), "dev", checksum);
        let dispatch = DispatchEvent::try_from(&event).unwrap();

        assert_eq!(dispatch.event_type, "backend-deploy backend/echo @ dev");
        assert_eq!(
            dispatch.payload,
            json!({
                "env": "dev",
                "service": "backend/echo",
                "checksum": "eb056704534378f374b4dc15d7761b9b2d415b68"
            })
        );
    }

    #[test]
    fn test_deploy_event_rejects_bad_checksum_payload() {
        let payload = json!({"env": "dev", "service": "echo", "checksum": "nope"});
        assert!(serde_json::from_value::<DeployEvent>(payload).is_err());
    }
}
