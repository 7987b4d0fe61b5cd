//! Storage configuration types and utilities

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::env::{ConfigErrors, EnvReader, EnvSource};

pub const STORAGE_TYPE_VAR: &str = "PIPELINE_STORAGE_TYPE";
pub const STORAGE_DIR_VAR: &str = "PIPELINE_STORAGE_DIR";
pub const BUCKET_VAR: &str = "INFRA_AWS_S3_BUCKET";
pub const REGION_VAR: &str = "INFRA_AWS_REGION";
pub const ENDPOINT_VAR: &str = "PIPELINE_S3_ENDPOINT";

pub const DEFAULT_REGION: &str = "eu-west-1";

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// S3 bucket (default)
    #[default]
    S3,
    /// Local directory mirroring the bucket layout
    File,
    /// In-process map (for testing)
    Memory,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage type {:?}, expected s3 or file", other)),
        }
    }
}

/// Main storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend-specific configuration
    pub backend_config: BackendConfig,
}

/// Backend-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    S3(S3Config),
    File(FileConfig),
    Memory,
}

/// S3 storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (minio, localstack)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// File storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Directory standing in for the bucket root
    pub base_dir: PathBuf,
}

impl StorageConfig {
    pub fn backend(&self) -> BackendType {
        match self.backend_config {
            BackendConfig::S3(_) => BackendType::S3,
            BackendConfig::File(_) => BackendType::File,
            BackendConfig::Memory => BackendType::Memory,
        }
    }

    /// Load storage configuration from environment variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigErrors> {
        let mut reader = EnvReader::new(env);

        let backend = match reader.optional(STORAGE_TYPE_VAR) {
            None => BackendType::default(),
            Some(raw) => match raw.parse::<BackendType>() {
                Ok(backend) => backend,
                Err(reason) => {
                    reader.invalid(STORAGE_TYPE_VAR, reason);
                    return Err(reader.into_errors());
                }
            },
        };

        let backend_config = match backend {
            BackendType::S3 => {
                let bucket = reader.required(BUCKET_VAR);
                let region = reader
                    .optional(REGION_VAR)
                    .unwrap_or_else(|| DEFAULT_REGION.to_string());
                let endpoint = reader.optional(ENDPOINT_VAR);
                bucket.map(|bucket| {
                    BackendConfig::S3(S3Config {
                        bucket,
                        region,
                        endpoint,
                    })
                })
            }
            BackendType::File => reader
                .required(STORAGE_DIR_VAR)
                .map(|dir| BackendConfig::File(FileConfig { base_dir: dir.into() })),
            BackendType::Memory => {
                // Test-only backend: pointers written by one run are gone in the next
                reader.invalid(
                    STORAGE_TYPE_VAR,
                    "memory storage does not persist between runs, expected s3 or file",
                );
                None
            }
        };

        match backend_config {
            Some(backend_config) if !reader.has_errors() => Ok(Self { backend_config }),
            _ => Err(reader.into_errors()),
        }
    }
}
