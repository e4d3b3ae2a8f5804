//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: decode, resize, orient and encode. The backend owns its in-memory
//! image representation through the associated [`ImageBackend::Image`] type;
//! the executor only moves those values from one stage to the next.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, statically
//! linked, no system codecs.

use super::format::OutputFormat;
use super::params::{EncodeParams, ResizeParams};
use image::metadata::Orientation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// A decoded source image plus what the container told us about it.
#[derive(Debug)]
pub struct Decoded<I> {
    pub image: I,
    /// EXIF orientation; `NoTransforms` when absent.
    pub orientation: Orientation,
    /// Container format sniffed from the bytes, when it is one we can emit.
    pub detected: Option<OutputFormat>,
}

/// Trait for image processing backends.
///
/// Every backend must implement all four operations so the executor stays
/// backend-agnostic. Operations consume and return images by value: each
/// stage's output is the next stage's only input.
pub trait ImageBackend: Sync {
    type Image;

    /// Decode raw bytes. `vector` asks for SVG rasterization.
    fn decode(&self, bytes: &[u8], vector: bool) -> Result<Decoded<Self::Image>, BackendError>;

    /// Resample to the requested box.
    fn resize(&self, image: Self::Image, params: &ResizeParams)
    -> Result<Self::Image, BackendError>;

    /// Apply a corrective orientation transform.
    fn orient(
        &self,
        image: Self::Image,
        orientation: Orientation,
    ) -> Result<Self::Image, BackendError>;

    /// Encode to the target format.
    fn encode(&self, image: &Self::Image, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
