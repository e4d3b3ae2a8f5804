use super::{CacheObject, CacheStore, StorageError, StorageResult, validate_key};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, error};

/// Access keys taken from configuration or the `AWS_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Cache store writing transformed images to an S3 (or S3-compatible) bucket.
pub struct S3CacheStore {
    client: Client,
    bucket: String,
}

impl S3CacheStore {
    pub fn new(client: Client, bucket: String) -> Self {
        debug!(%bucket, "initializing S3 cache store");
        Self { client, bucket }
    }

    /// Build a client for `region`, optionally against a custom endpoint
    /// (path-style addressing). Requests are never retried.
    pub fn from_settings(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: Option<StaticCredentials>,
    ) -> Self {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        if let Some(creds) = credentials {
            builder = builder.credentials_provider(Credentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                creds.session_token,
                None,
                "image-handler-config",
            ));
        }

        Self::new(Client::from_conf(builder.build()), bucket.to_string())
    }
}

#[async_trait]
impl CacheStore for S3CacheStore {
    async fn put(&self, object: CacheObject<'_>) -> StorageResult<()> {
        let key = validate_key(object.key)?;
        debug!(bucket = %self.bucket, %key, bytes = object.body.len(), "putting object");

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(object.body.to_vec()))
            .content_type(object.content_type)
            .cache_control(object.cache_control)
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                error!(%key, "S3 put_object failed: {detail}");
                StorageError::Backend(format!("S3 put_object failed: {detail}"))
            })?;

        debug!(%key, etag = ?result.e_tag(), "stored object");
        Ok(())
    }
}
