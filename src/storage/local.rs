use super::{CacheObject, CacheStore, SourceFetcher, StorageError, StorageResult, validate_key};
use crate::types::SourceImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Suffix of the JSON sidecar written next to each cached object.
const META_SUFFIX: &str = ".meta.json";

/// Directory-backed store. Serves as a source for local development and as a
/// cache store when no S3 bucket is configured.
///
/// Use separate roots for source and cache: a cached key such as
/// `cat.png/width=100` needs `cat.png` to be a directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

/// Response metadata stored beside a cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMetadata {
    pub content_type: String,
    pub cache_control: String,
}

impl LocalStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        Ok(self.base_path.join(validate_key(key)?))
    }

    fn meta_path(object_path: &Path) -> PathBuf {
        let mut name = object_path.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    /// Read back the sidecar of a cached object.
    pub async fn read_metadata(&self, key: &str) -> StorageResult<CachedMetadata> {
        let path = Self::meta_path(&self.object_path(key)?);
        let json = fs::read(&path).await.map_err(|e| not_found_or_io(e, key))?;
        serde_json::from_slice(&json)
            .map_err(|e| StorageError::Backend(format!("corrupt metadata for {key}: {e}")))
    }
}

fn not_found_or_io(e: std::io::Error, key: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(e)
    }
}

/// Content type from a file extension; `None` when unknown.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("avif") => Some("image/avif"),
        Some("svg") => Some("image/svg+xml"),
        Some("tif") | Some("tiff") => Some("image/tiff"),
        _ => None,
    }
}

#[async_trait]
impl SourceFetcher for LocalStorage {
    async fn fetch(&self, key: &str) -> StorageResult<SourceImage> {
        let path = self.object_path(key)?;
        debug!(path = %path.display(), "reading source image");
        let bytes = fs::read(&path).await.map_err(|e| not_found_or_io(e, key))?;
        Ok(SourceImage::new(
            bytes,
            content_type_for(&path).map(str::to_string),
        ))
    }
}

#[async_trait]
impl CacheStore for LocalStorage {
    async fn put(&self, object: CacheObject<'_>) -> StorageResult<()> {
        let path = self.object_path(object.key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), bytes = object.body.len(), "writing cached object");
        fs::write(&path, object.body).await?;

        let meta = CachedMetadata {
            content_type: object.content_type.to_string(),
            cache_control: object.cache_control.to_string(),
        };
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| StorageError::Backend(format!("metadata encode failed: {e}")))?;
        fs::write(Self::meta_path(&path), json).await?;
        Ok(())
    }
}
