//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` (JPEG, PNG, GIF, WebP), `rav1d` (AVIF), `resvg` (SVG) |
//! | **Resize** | Lanczos3, exact or cover-and-crop |
//! | **Orient** | EXIF orientation read at decode, applied after resize |
//! | **Encode** | JPEG, PNG, GIF, lossless WebP, AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters** / **Format**: Data describing image operations and encodings
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The transform executor driving a backend stage by stage

mod avif;
pub mod backend;
pub mod calculations;
pub mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, ImageBackend};
pub use format::OutputFormat;
pub use operations::{TransformError, transform};
pub use params::{EncodeParams, Quality, ResizeParams};
pub use rust_backend::RustBackend;
