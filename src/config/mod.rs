//! Environment-sourced configuration
//!
//! All settings are read once at startup into an immutable [`PipelineConfig`]
//! which is then passed by reference to the stage that needs it. Loading
//! validates everything the stage will need before any I/O happens and
//! reports every missing or malformed variable in one error.

pub mod env;
pub mod github;

pub use env::{ConfigErrors, ConfigIssue, EnvSource, MapEnv, ProcessEnv};
pub use github::{GitHubSettings, Secret};

use std::time::Duration;

use crate::error::PipelineError;
use crate::storage::StorageConfig;
use env::EnvReader;

pub const HTTP_TIMEOUT_VAR: &str = "PIPELINE_HTTP_TIMEOUT_SECS";
pub const DEPLOY_TIMEOUT_VAR: &str = "PIPELINE_DEPLOY_TIMEOUT_SECS";
pub const DEPLOY_TOOL_VAR: &str = "PIPELINE_DEPLOY_TOOL";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DEPLOY_TOOL: &str = "serverless";

/// Which parts of the configuration a stage depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub storage: bool,
    pub github: bool,
}

impl Requirements {
    pub fn storage(mut self) -> Self {
        self.storage = true;
        self
    }

    pub fn github(mut self) -> Self {
        self.github = true;
        self
    }
}

/// Timeouts and the deploy program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub http_timeout: Duration,
    /// `None` lets the deploy tool run as long as it needs
    pub deploy_timeout: Option<Duration>,
    pub deploy_tool: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            deploy_timeout: None,
            deploy_tool: DEFAULT_DEPLOY_TOOL.to_string(),
        }
    }
}

impl RuntimeSettings {
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigErrors> {
        let mut reader = EnvReader::new(env);
        let http_timeout = reader
            .optional_secs(HTTP_TIMEOUT_VAR)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let deploy_timeout = reader.optional_secs(DEPLOY_TIMEOUT_VAR);
        let deploy_tool = reader
            .optional(DEPLOY_TOOL_VAR)
            .unwrap_or_else(|| DEFAULT_DEPLOY_TOOL.to_string());

        if reader.has_errors() {
            return Err(reader.into_errors());
        }
        Ok(Self {
            http_timeout,
            deploy_timeout,
            deploy_tool,
        })
    }
}

/// Everything a stage reads from the environment
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage: Option<StorageConfig>,
    pub github: Option<GitHubSettings>,
    pub runtime: RuntimeSettings,
}

impl PipelineConfig {
    /// Load the sections named in `requirements`, failing with every problem at once
    pub fn load(env: &dyn EnvSource, requirements: Requirements) -> Result<Self, ConfigErrors> {
        let storage = requirements
            .storage
            .then(|| StorageConfig::from_env(env))
            .transpose();
        let github = requirements
            .github
            .then(|| GitHubSettings::from_env(env))
            .transpose();
        let runtime = RuntimeSettings::from_env(env);

        match (storage, github, runtime) {
            (Ok(storage), Ok(github), Ok(runtime)) => Ok(Self {
                storage,
                github,
                runtime,
            }),
            (storage, github, runtime) => {
                let mut errors = ConfigErrors::default();
                for result in [storage.err(), github.err(), runtime.err()]
                    .into_iter()
                    .flatten()
                {
                    errors.extend(result);
                }
                Err(errors)
            }
        }
    }

    pub fn storage(&self) -> Result<&StorageConfig, PipelineError> {
        self.storage
            .as_ref()
            .ok_or_else(|| PipelineError::config("storage settings were not loaded"))
    }

    pub fn github(&self) -> Result<&GitHubSettings, PipelineError> {
        self.github
            .as_ref()
            .ok_or_else(|| PipelineError::config("GitHub settings were not loaded"))
    }
}

impl From<ConfigErrors> for PipelineError {
    fn from(errors: ConfigErrors) -> Self {
        PipelineError::Config(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_only_requested_sections_are_loaded() {
        let config = PipelineConfig::load(&MapEnv::new(), Requirements::default()).unwrap();
        assert!(config.storage.is_none());
        assert!(config.github.is_none());
        assert_eq!(config.runtime, RuntimeSettings::default());
        assert_eq!(config.github().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_collects_issues_across_sections() {
        let env = MapEnv::new().with(HTTP_TIMEOUT_VAR, "-1");
        let errors =
            PipelineConfig::load(&env, Requirements::default().storage().github()).unwrap_err();

        assert_eq!(
            errors.missing_vars(),
            vec!["INFRA_AWS_S3_BUCKET", "GITHUB_REPOSITORY", "PERSONAL_ACCESS_TOKEN"]
        );
        assert_eq!(errors.issues().len(), 4);
    }

    #[test]
    fn test_full_config() {
        let env = MapEnv::new()
            .with("INFRA_AWS_S3_BUCKET", "artifacts")
            .with("INFRA_AWS_REGION", "us-east-1")
            .with("GITHUB_REPOSITORY", "acme/infra")
            .with("PERSONAL_ACCESS_TOKEN", "t")
            .with(DEPLOY_TIMEOUT_VAR, "600")
            .with(DEPLOY_TOOL_VAR, "sls");
        let config = PipelineConfig::load(&env, Requirements::default().storage().github()).unwrap();

        assert!(config.storage().is_ok());
        assert_eq!(config.github().unwrap().repository.to_string(), "acme/infra");
        assert_eq!(config.runtime.deploy_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.runtime.deploy_tool, "sls");
        assert_eq!(config.runtime.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn test_config_errors_convert_to_config_kind() {
        let err: PipelineError = ConfigErrors::missing("SERVICE").into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("`SERVICE` is not set"));
    }
}
