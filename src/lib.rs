//! # Image Handler
//!
//! An on-demand image transformation endpoint. A request path names a source
//! image and a comma-separated directive; the handler fetches the source,
//! transforms it, optionally caches the result and answers with the bytes, a
//! redirect to the cached copy, or a structured error.
//!
//! ```text
//! GET /img/products/shoe.jpg/width=400,format=webp,quality=70
//!     ^^^ ^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//!     |   source key         directive
//!     ignored root
//! ```
//!
//! # Architecture: One Pipeline, Swappable Edges
//!
//! ```text
//! InboundRequest → fetch → parse → transform → size check → (cache write) → PipelineOutcome → HttpResponse
//! ```
//!
//! The decision logic in [`pipeline`] is the testable core. Everything that
//! touches the outside world sits behind a trait:
//!
//! - [`imaging::ImageBackend`] decodes, resizes, orients and encodes pixels.
//! - [`storage::SourceFetcher`] and [`storage::CacheStore`] move bytes to and
//!   from object stores.
//!
//! Tests drive the pipeline with a recording mock backend and in-memory
//! stores; production uses [`imaging::RustBackend`], an HTTP origin and S3.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | Method check and path splitting into source key + directive |
//! | [`directive`] | Directive string → typed [`directive::OperationSet`] |
//! | [`imaging`] | Pure-Rust image backend and the fixed-order transform executor |
//! | [`size_guard`] | Inline size limit |
//! | [`pipeline`] | Orchestration, failure mapping, stage timing |
//! | [`timing`] | `Server-Timing` log |
//! | [`response`] | camelCase JSON response envelope |
//! | [`storage`] | HTTP / local / S3 collaborators |
//! | [`config`] | `config.toml` + environment configuration |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Redirect Instead of Truncate
//!
//! Function runtimes cap response bodies. A result above `max_output_bytes` is
//! written to the cache store and answered with `302` to the cached copy; if
//! that write fails, or no cache is configured, the request fails with `403`
//! rather than returning something the gateway would reject.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate, `rav1d` for AVIF decode and
//! `resvg` for SVG. No system libraries, so the binary drops into a minimal
//! function runtime as is.
//!
//! ## No Retries
//!
//! Neither the source fetch nor the cache write is retried. A slow origin is
//! bounded by the fetch timeout; the caller (or CDN) decides whether to retry.

pub mod config;
pub mod directive;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod size_guard;
pub mod storage;
pub mod timing;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
