//! Response envelope handed back to the front end.
//!
//! Serialized as camelCase JSON (`statusCode`, `headers`, `body`,
//! `isBase64Encoded`), the shape API gateways expect from a function.

use crate::pipeline::PipelineOutcome;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex characters of the body digest used in `ETag`.
const ETAG_HEX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl HttpResponse {
    /// Raw body bytes, decoding base64 when needed.
    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body)
        } else {
            Ok(self.body.as_bytes().to_vec())
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Quoted prefix of the SHA-256 of `body`.
pub fn etag(body: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(body));
    format!("\"{}\"", &digest[..ETAG_HEX_LEN])
}

fn headers<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

impl From<PipelineOutcome> for HttpResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Inline {
                body,
                content_type,
                cache_control,
                timing,
            } => Self {
                status_code: 200,
                headers: headers([
                    ("Content-Type", content_type),
                    ("Cache-Control", cache_control),
                    ("Server-Timing", timing.header_value()),
                    ("ETag", etag(&body)),
                ]),
                body: STANDARD.encode(&body),
                is_base64_encoded: true,
            },
            PipelineOutcome::Redirect {
                location,
                cache_control,
                timing,
            } => Self {
                status_code: 302,
                headers: headers([
                    ("Location", location),
                    ("Cache-Control", cache_control),
                    ("Server-Timing", timing.header_value()),
                ]),
                body: String::new(),
                is_base64_encoded: false,
            },
            PipelineOutcome::Failure { status, message } => Self {
                status_code: status,
                headers: headers([("Content-Type", "application/json".to_string())]),
                body: serde_json::json!({ "status": status, "message": message }).to_string(),
                is_base64_encoded: false,
            },
        }
    }
}
