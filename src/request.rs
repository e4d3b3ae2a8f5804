//! Inbound request parsing.
//!
//! Requests arrive as `GET /<root>/<source key...>/<directive>`:
//!
//! ```text
//! /img/products/shoes/red sneaker.jpg/width=400,format=webp
//!  ^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^
//!  |   source key                     directive
//!  ignored root segment
//! ```
//!
//! The root segment is whatever prefix the front end mounts the handler at.
//! The last segment is always the directive, even when empty, so
//! `/img/cat.png/` asks for `cat.png` untransformed.

use crate::directive;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(String),
    #[error("path {0:?} does not name a source image and a directive")]
    MalformedPath(String),
}

/// A request as handed over by the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    /// Accepted for forward compatibility; not used by the pipeline.
    pub query: Option<BTreeMap<String, String>>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }
}

/// A validated request: which object to fetch and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub source_key: String,
    pub directive: String,
}

impl TransformRequest {
    /// Validate method and split the path.
    pub fn from_inbound(request: &InboundRequest) -> Result<Self, RequestError> {
        if request.method != "GET" {
            return Err(RequestError::MethodNotAllowed(request.method.clone()));
        }

        let path = request.path.strip_prefix('/').unwrap_or(&request.path);
        let segments: Vec<&str> = path.split('/').collect();
        let [_root, source @ .., directive] = segments.as_slice() else {
            return Err(RequestError::MalformedPath(request.path.clone()));
        };
        let source_key = source.join("/");
        if source_key.trim_matches('/').is_empty() {
            return Err(RequestError::MalformedPath(request.path.clone()));
        }

        Ok(Self {
            source_key,
            directive: (*directive).to_string(),
        })
    }

    /// Key of the transformed object in the cache store.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.source_key, self.directive)
    }

    /// Where an oversized result is served from once cached.
    pub fn redirect_location(&self) -> String {
        format!(
            "/{}?{}",
            self.source_key,
            directive::to_query_string(&self.directive)
        )
    }
}
