//! S3 blob store implementation

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::storage::{
    config::S3Config,
    error::{StorageError, StorageResult},
    traits::BlobStore,
};

/// S3 blob store
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create new S3 store. Credentials come from the standard AWS chain.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        info!(
            "Initializing S3 store (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (minio, localstack) rarely support virtual-host addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        debug!("Downloading {}", self.location(key));

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key())
                    || err
                        .raw_response()
                        .is_some_and(|response| response.status().as_u16() == 404);
                if missing {
                    debug!("{} does not exist", self.location(key));
                    return Ok(None);
                }
                return Err(StorageError::remote(format!(
                    "failed to download {}: {}",
                    self.location(key),
                    DisplayErrorContext(&err)
                )));
            }
        };

        let bytes = output.body.collect().await.map_err(|e| {
            StorageError::remote(format!("failed to read {}: {}", self.location(key), e))
        })?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), self.location(key));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                StorageError::remote(format!(
                    "failed to upload {}: {}",
                    self.location(key),
                    DisplayErrorContext(&err)
                ))
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
