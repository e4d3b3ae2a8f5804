//! Object storage collaborators.
//!
//! The pipeline talks to two stores through narrow async traits:
//!
//! - [`SourceFetcher`]: where original images live (HTTP origin or a local
//!   directory).
//! - [`CacheStore`]: where transformed images are written (S3 or a local
//!   directory). Optional: without one, caching is disabled.
//!
//! Both are treated as already concurrency-safe services; implementations
//! hold no mutable state of their own.

pub mod http;
pub mod local;
pub mod s3;

use crate::config::{CacheConfig, SourceConfig};
use crate::types::SourceImage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use http::HttpSource;
pub use local::LocalStorage;
pub use s3::S3CacheStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Origin answered {status} for {key}")]
    Status { status: u16, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A transformed image on its way into the cache store.
#[derive(Debug, Clone, Copy)]
pub struct CacheObject<'a> {
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
    pub cache_control: &'a str,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the source image stored under `key`.
    async fn fetch(&self, key: &str) -> StorageResult<SourceImage>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Write a transformed image. Overwrites any existing object.
    async fn put(&self, object: CacheObject<'_>) -> StorageResult<()>;
}

/// Normalize an object key: strip leading slashes, reject empty keys and
/// `..` segments.
pub fn validate_key(key: &str) -> StorageResult<&str> {
    let clean = key.trim_start_matches('/');
    if clean.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if clean.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "key contains a parent segment: {key}"
        )));
    }
    Ok(clean)
}

/// Build the source fetcher described by the configuration.
pub fn build_source(config: &SourceConfig) -> StorageResult<Arc<dyn SourceFetcher>> {
    Ok(match config {
        SourceConfig::Http { url, timeout_secs } => {
            Arc::new(HttpSource::new(url, Duration::from_secs(*timeout_secs))?)
        }
        SourceConfig::Local { path } => Arc::new(LocalStorage::new(path.clone())),
    })
}

/// Build the cache store described by the configuration.
pub fn build_cache(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config {
        CacheConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            let credentials = match (access_key_id, secret_access_key) {
                (Some(access), Some(secret)) => Some(s3::StaticCredentials {
                    access_key_id: access.clone(),
                    secret_access_key: secret.clone(),
                    session_token: session_token.clone(),
                }),
                _ => None,
            };
            Arc::new(S3CacheStore::from_settings(
                bucket,
                region,
                endpoint.as_deref(),
                credentials,
            ))
        }
        CacheConfig::Local { path } => Arc::new(LocalStorage::new(path.clone())),
    }
}
