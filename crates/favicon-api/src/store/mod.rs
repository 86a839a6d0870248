//! Object-store tier
//!
//! A small key/value blob API over an S3-compatible bucket: `HEAD` for
//! existence plus metadata, `PUT` with metadata and a public-read ACL. Keys
//! are deterministic per host, so concurrent writers for the same host are
//! idempotent and last-writer-wins.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::{AppError, AppResult};

pub mod memory;

pub use memory::MemoryObjectStore;

/// Object key for a host's normalized favicon.
pub fn object_key(host: &str) -> String {
    format!("favicons/{host}.png")
}

/// Blob store consumed by the resolution coordinator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Probe a key. `Ok(Some(metadata))` when the object exists, `Ok(None)`
    /// when it does not; any other failure is unexpected.
    async fn head(&self, key: &str) -> AppResult<Option<HashMap<String, String>>>;

    /// Store a blob with its content type and metadata, publicly readable.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<()>;
}

/// S3-compatible object store (AWS S3, Backblaze B2, MinIO, ...).
///
/// Credentials are provided explicitly from the environment. Path-style
/// addressing keeps non-AWS endpoints working.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "favicon-api-env",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> AppResult<Option<HashMap<String, String>>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(output.metadata().cloned().unwrap_or_default())),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Ok(None);
                }
                Err(AppError::store("head", err.to_string()))
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<()> {
        debug!(key, size = bytes.len(), "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|err| AppError::store("put", err.to_string()))?;
        Ok(())
    }
}
