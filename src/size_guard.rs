//! Output size policy.
//!
//! Inline responses are capped (API gateways and function runtimes reject
//! bodies above a few megabytes once base64-encoded). Anything larger must be
//! served from the cache store by redirect, or refused.

use crate::types::TransformResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGuard {
    max_bytes: u64,
}

impl SizeGuard {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Strictly larger than the maximum; a body of exactly `max_bytes` is fine.
    pub fn is_oversized(&self, len: usize) -> bool {
        len as u64 > self.max_bytes
    }

    /// Stamp the `oversized` flag on an executor result.
    pub fn classify(&self, result: TransformResult) -> TransformResult {
        TransformResult {
            oversized: self.is_oversized(result.len()),
            ..result
        }
    }
}
