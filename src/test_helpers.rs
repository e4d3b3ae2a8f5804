//! Shared test utilities: in-memory storage collaborators and fixture images.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = MemorySource::new().with("cat.png", png_bytes(40, 30), "image/png");
//! let cache = MemoryCache::new();
//! // ... run a pipeline ...
//! assert_eq!(cache.keys(), vec!["cat.png/width=10"]);
//! ```

use crate::storage::{CacheObject, CacheStore, SourceFetcher, StorageError, StorageResult};
use crate::types::SourceImage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Collaborators
// =========================================================================

/// Source store backed by a map. Unknown keys are `NotFound`.
#[derive(Default)]
pub struct MemorySource {
    objects: HashMap<String, SourceImage>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, bytes: Vec<u8>, content_type: &str) -> Self {
        self.objects.insert(
            key.to_string(),
            SourceImage::new(bytes, Some(content_type.to_string())),
        );
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MemorySource {
    async fn fetch(&self, key: &str) -> StorageResult<SourceImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

/// One recorded `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// Cache store recording every write; optionally failing all of them.
#[derive(Default)]
pub struct MemoryCache {
    stored: Mutex<Vec<StoredObject>>,
    fail: bool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<StoredObject> {
        self.stored.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.stored().into_iter().map(|o| o.key).collect()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn put(&self, object: CacheObject<'_>) -> StorageResult<()> {
        if self.fail {
            return Err(StorageError::Backend("simulated put failure".into()));
        }
        self.stored.lock().unwrap().push(StoredObject {
            key: object.key.to_string(),
            body: object.body.to_vec(),
            content_type: object.content_type.to_string(),
            cache_control: object.cache_control.to_string(),
        });
        Ok(())
    }
}

// =========================================================================
// Fixture images
// =========================================================================

/// A `width`×`height` PNG with a horizontal red gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, _| {
        image::Rgb([(x * 255 / width.max(1)) as u8, 0, 0])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// JPEG whose APP1 segment carries a single EXIF Orientation tag.
///
/// The pixels are stored `width`×`height`; a viewer honoring `orientation`
/// (6 = rotate 90° clockwise) shows them `height`×`width`.
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let mut jpeg = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 8) as u8, (y * 8) as u8, 64])
    }))
    .write_to(&mut jpeg, image::ImageFormat::Jpeg)
    .unwrap();
    let jpeg = jpeg.into_inner();

    // Little-endian TIFF: header, one IFD with one SHORT entry, no next IFD
    let [lo, hi] = orientation.to_le_bytes();
    let tiff = [
        b'I', b'I', 0x2A, 0, 8, 0, 0, 0, //
        1, 0, //
        0x12, 0x01, 3, 0, 1, 0, 0, 0, lo, hi, 0, 0, //
        0, 0, 0, 0,
    ];
    let len = (2 + 6 + tiff.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + len as usize + 2);
    out.extend_from_slice(&jpeg[..2]); // SOI
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}
