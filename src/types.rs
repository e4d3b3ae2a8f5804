//! Values passed between pipeline stages.
//!
//! Each lives for exactly one request: the source is dropped once the
//! executor has consumed it, and the result is classified once by the
//! [`SizeGuard`](crate::size_guard::SizeGuard) and then only read.

/// Source bytes as fetched, with the declared `Content-Type` if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }
}

/// Executor output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Set by the size guard; `false` straight out of the executor.
    pub oversized: bool,
}

impl TransformResult {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            oversized: false,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
