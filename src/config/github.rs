//! Settings for talking to the GitHub API

use std::fmt;
use url::Url;

use super::env::{EnvReader, EnvSource, ConfigErrors};
use crate::notify::RepositorySlug;

pub const REPOSITORY_VARS: &[&str] = &["GITHUB_REPOSITORY", "REPOSITORY"];
pub const TOKEN_VAR: &str = "PERSONAL_ACCESS_TOKEN";
pub const API_URL_VAR: &str = "GITHUB_API_URL";
pub const RUN_ID_VAR: &str = "GITHUB_RUN_ID";
pub const WORKFLOW_VAR: &str = "GITHUB_WORKFLOW";

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Token that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub repository: RepositorySlug,
    pub token: Secret,
    pub api_url: Url,
    /// CI run metadata, logged for traceability
    pub run_id: Option<String>,
    pub workflow: Option<String>,
}

impl GitHubSettings {
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigErrors> {
        let mut reader = EnvReader::new(env);

        let repository = reader
            .required_any(REPOSITORY_VARS)
            .and_then(|raw| match RepositorySlug::parse(&raw) {
                Ok(slug) => Some(slug),
                Err(e) => {
                    reader.invalid(REPOSITORY_VARS[0], e.to_string());
                    None
                }
            });
        let token = reader.required(TOKEN_VAR).map(Secret::new);
        let api_url = match reader.optional(API_URL_VAR) {
            None => Url::parse(DEFAULT_API_URL).ok(),
            Some(raw) => match Url::parse(raw.trim_end_matches('/')) {
                Ok(url) => Some(url),
                Err(e) => {
                    reader.invalid(API_URL_VAR, e.to_string());
                    None
                }
            },
        };
        let run_id = reader.optional(RUN_ID_VAR);
        let workflow = reader.optional(WORKFLOW_VAR);

        match (repository, token, api_url) {
            (Some(repository), Some(token), Some(api_url)) if !reader.has_errors() => Ok(Self {
                repository,
                token,
                api_url,
                run_id,
                workflow,
            }),
            _ => Err(reader.into_errors()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;

    #[test]
    fn test_loads_with_defaults() {
        let env = MapEnv::new()
            .with("GITHUB_REPOSITORY", "acme/infra")
            .with(TOKEN_VAR, "ghp_secret");
        let settings = GitHubSettings::from_env(&env).unwrap();
        assert_eq!(settings.repository.to_string(), "acme/infra");
        assert_eq!(settings.token.expose(), "ghp_secret");
        assert_eq!(settings.api_url.as_str(), "https://api.github.com/");
        assert_eq!(settings.run_id, None);
    }

    #[test]
    fn test_token_is_redacted() {
        let env = MapEnv::new()
            .with("REPOSITORY", "acme/infra")
            .with(TOKEN_VAR, "ghp_secret");
        let settings = GitHubSettings::from_env(&env).unwrap();
        assert!(!format!("{:?}", settings).contains("ghp_secret"));
    }

    #[test]
    fn test_reports_every_missing_var() {
        let errors = GitHubSettings::from_env(&MapEnv::new()).unwrap_err();
        assert_eq!(errors.missing_vars(), vec!["GITHUB_REPOSITORY", TOKEN_VAR]);
    }

    #[test]
    fn test_rejects_bad_slug_and_url() {
        let env = MapEnv::new()
            .with("GITHUB_REPOSITORY", "just-a-name")
            .with(TOKEN_VAR, "t")
            .with(API_URL_VAR, "not a url");
        let errors = GitHubSettings::from_env(&env).unwrap_err();
        assert_eq!(errors.issues().len(), 2);
        assert!(errors.missing_vars().is_empty());
    }
}
