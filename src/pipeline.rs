//! Request orchestration.
//!
//! One [`Pipeline::handle`] call per inbound request:
//!
//! ```text
//! request → fetch → parse + transform → size check ─┬─ fits ──→ (cache write, best effort) → Inline
//!                                                   └─ too big → cache write ─┬─ ok ───→ Redirect
//!                                                                             └─ failed → 403
//! ```
//!
//! Every failure becomes a [`PipelineOutcome::Failure`] with a generic public
//! message; the detailed cause is logged. Completed stages are timed into a
//! [`TimingLog`] carried by successful outcomes.

use crate::config::HandlerConfig;
use crate::directive;
use crate::imaging::{ImageBackend, TransformError, transform};
use crate::request::{InboundRequest, RequestError, TransformRequest};
use crate::size_guard::SizeGuard;
use crate::storage::{CacheObject, CacheStore, SourceFetcher, StorageError};
use crate::timing::{Stage, TimingLog};
use crate::types::TransformResult;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// `Cache-Control` of redirects: the redirect itself must never be cached.
pub const REDIRECT_CACHE_CONTROL: &str = "private,no-store";

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Inline {
        body: Vec<u8>,
        content_type: String,
        cache_control: String,
        timing: TimingLog,
    },
    Redirect {
        location: String,
        cache_control: String,
        timing: TimingLog,
    },
    Failure {
        status: u16,
        message: String,
    },
}

impl PipelineOutcome {
    pub fn status(&self) -> u16 {
        match self {
            Self::Inline { .. } => 200,
            Self::Redirect { .. } => 302,
            Self::Failure { status, .. } => *status,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("bad request: {0}")]
    BadRequest(#[from] RequestError),
    #[error("source fetch failed: {0}")]
    Fetch(#[source] StorageError),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error("transformed image is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: u64 },
    #[error("cache write failed: {0}")]
    CacheWrite(#[source] StorageError),
}

impl PipelineError {
    /// HTTP status when this error ends the request. `CacheWrite` never does:
    /// it is tolerated or escalated to `TooLarge`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Fetch(_) | Self::Transform(_) => Some(500),
            Self::TooLarge { .. } => Some(403),
            Self::CacheWrite(_) => None,
        }
    }

    /// Message safe to show to callers.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(RequestError::MethodNotAllowed(_)) => "only GET requests are supported",
            Self::BadRequest(RequestError::MalformedPath(_)) => {
                "path must name a source image and a directive"
            }
            Self::Fetch(_) => "failed to fetch source image",
            Self::Transform(_) => "failed to transform image",
            Self::TooLarge { .. } => "requested transformed image is too big",
            Self::CacheWrite(_) => "failed to store transformed image",
        }
    }
}

/// Borrowed view of everything a request needs. Cheap to build per request.
pub struct Pipeline<'a, B: ImageBackend> {
    backend: &'a B,
    source: &'a dyn SourceFetcher,
    cache: Option<&'a dyn CacheStore>,
    guard: SizeGuard,
    cache_control: &'a str,
}

impl<'a, B: ImageBackend> Pipeline<'a, B> {
    pub fn new(config: &'a HandlerConfig, backend: &'a B, source: &'a dyn SourceFetcher) -> Self {
        Self {
            backend,
            source,
            cache: None,
            guard: config.size_guard(),
            cache_control: &config.cache_control,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run one request to its outcome. Never fails; errors become
    /// [`PipelineOutcome::Failure`].
    pub async fn handle(&self, request: &InboundRequest) -> PipelineOutcome {
        match self.run(request).await {
            Ok(outcome) => {
                info!(
                    method = %request.method,
                    path = %request.path,
                    status = outcome.status(),
                    "request served"
                );
                outcome
            }
            Err(err) => {
                let status = err.status().unwrap_or(500);
                error!(
                    method = %request.method,
                    path = %request.path,
                    status,
                    error = %err,
                    "request failed"
                );
                PipelineOutcome::Failure {
                    status,
                    message: err.public_message().to_string(),
                }
            }
        }
    }

    async fn run(&self, inbound: &InboundRequest) -> Result<PipelineOutcome, PipelineError> {
        let request = TransformRequest::from_inbound(inbound)?;
        let mut timing = TimingLog::new();

        let started = Instant::now();
        let source = self
            .source
            .fetch(&request.source_key)
            .await
            .map_err(PipelineError::Fetch)?;
        timing.record_since(Stage::Fetch, started);
        debug!(key = %request.source_key, bytes = source.bytes.len(), "fetched");

        let started = Instant::now();
        let ops = directive::parse(&request.directive).map_err(TransformError::from)?;
        let result = transform(self.backend, &source, &ops)?;
        drop(source);
        timing.record_since(Stage::Transform, started);

        let started = Instant::now();
        let result = self.guard.classify(result);
        timing.record_since(Stage::SizeCheck, started);

        if result.oversized {
            return self.redirect_oversized(&request, &result, timing).await;
        }

        if let Some(cache) = self.cache {
            let key = request.cache_key();
            let started = Instant::now();
            match cache.put(self.cache_object(&key, &result)).await {
                Ok(()) => timing.record_since(Stage::CacheWrite, started),
                Err(e) => warn!(
                    %key,
                    error = %PipelineError::CacheWrite(e),
                    "best-effort cache write failed, serving inline"
                ),
            }
        }

        Ok(PipelineOutcome::Inline {
            body: result.bytes,
            content_type: result.content_type,
            cache_control: self.cache_control.to_string(),
            timing,
        })
    }

    /// Oversized results can only be served from the cache.
    async fn redirect_oversized(
        &self,
        request: &TransformRequest,
        result: &TransformResult,
        mut timing: TimingLog,
    ) -> Result<PipelineOutcome, PipelineError> {
        let too_large = PipelineError::TooLarge {
            size: result.len(),
            max: self.guard.max_bytes(),
        };
        let Some(cache) = self.cache else {
            return Err(too_large);
        };

        let key = request.cache_key();
        let started = Instant::now();
        if let Err(e) = cache.put(self.cache_object(&key, result)).await {
            error!(
                %key,
                error = %PipelineError::CacheWrite(e),
                "cache write for oversized image failed"
            );
            return Err(too_large);
        }
        timing.record_since(Stage::CacheWrite, started);

        Ok(PipelineOutcome::Redirect {
            location: request.redirect_location(),
            cache_control: REDIRECT_CACHE_CONTROL.to_string(),
            timing,
        })
    }

    fn cache_object<'r>(&'r self, key: &'r str, result: &'r TransformResult) -> CacheObject<'r> {
        CacheObject {
            key,
            body: &result.bytes,
            content_type: &result.content_type,
            cache_control: self.cache_control,
        }
    }
}
