//! GitHub repository-dispatch client

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{Notifier, NotifyError, RepositorySlug};
use crate::config::github::{GitHubSettings, Secret};
use crate::config::RuntimeSettings;
use crate::events::DispatchEvent;

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    event_type: &'a str,
    client_payload: &'a Value,
}

/// Fires `repository_dispatch` events through the REST API
pub struct GitHubDispatcher {
    client: Client,
    endpoint: String,
    repository: RepositorySlug,
    token: Secret,
}

impl GitHubDispatcher {
    pub fn new(github: &GitHubSettings, runtime: &RuntimeSettings) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(runtime.http_timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}/repos/{}/{}/dispatches",
            github.api_url.as_str().trim_end_matches('/'),
            github.repository.owner(),
            github.repository.name()
        );

        Ok(Self {
            client,
            endpoint,
            repository: github.repository.clone(),
            token: github.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for GitHubDispatcher {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<(), NotifyError> {
        let request = DispatchRequest {
            event_type: &event.event_type,
            client_payload: &event.payload,
        };
        debug!("POST {} {}", self.endpoint, serde_json::to_string(&request)?);

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.expose()))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("backend-pipeline/", env!("CARGO_PKG_VERSION")))
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Dispatched '{}' to {}",
            event.event_type, self.repository
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn dispatcher(server: &MockServer) -> GitHubDispatcher {
        let github = GitHubSettings {
            repository: RepositorySlug::parse("acme/infra").unwrap(),
            token: Secret::new("ghp_test"),
            api_url: Url::parse(&server.base_url()).unwrap(),
            run_id: None,
            workflow: None,
        };
        let runtime = RuntimeSettings {
            http_timeout: Duration::from_secs(5),
            ..RuntimeSettings::default()
        };
        GitHubDispatcher::new(&github, &runtime).unwrap()
    }

    fn event() -> DispatchEvent {
        DispatchEvent::new(
            "backend-build echo",
            json!({"commitSHA": "abc", "service": "echo"}),
        )
    }

    #[tokio::test]
    async fn test_dispatch_posts_event() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/infra/dispatches")
                .header("Authorization", "Bearer ghp_test")
                .json_body(json!({
                    "event_type": "backend-build echo",
                    "client_payload": {"commitSHA": "abc", "service": "echo"}
                }));
            then.status(204);
        });

        dispatcher(&server).dispatch(&event()).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/repos/acme/infra/dispatches");
            then.status(422).body("Invalid request");
        });

        let err = dispatcher(&server).dispatch(&event()).await.unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "Invalid request");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        let github = GitHubSettings {
            repository: RepositorySlug::parse("acme/infra").unwrap(),
            token: Secret::new("t"),
            api_url: Url::parse("https://ghe.example.com/api/v3/").unwrap(),
            run_id: None,
            workflow: None,
        };
        let dispatcher = GitHubDispatcher::new(&github, &RuntimeSettings::default()).unwrap();
        assert_eq!(
            dispatcher.endpoint(),
            "https://ghe.example.com/api/v3/repos/acme/infra/dispatches"
        );
    }
}
