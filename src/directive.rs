//! Directive string parser.
//!
//! The last path segment of a request carries the operations to apply as
//! comma-separated `key=value` tokens:
//!
//! ```text
//! width=400,height=300,format=webp,quality=70
//! original                                      ← no operations
//! ```
//!
//! | Key | Value | Invalid value |
//! |---|---|---|
//! | `width`, `height` | positive integer (pixels) | ignored |
//! | `quality` | integer, clamped to 1–100 | ignored |
//! | `format` | `jpeg`/`jpg`, `png`, `gif`, `webp`, `avif` | treated as `jpeg` |
//!
//! Unknown keys are ignored and a malformed numeric field only drops that
//! field, so a typo degrades the output instead of failing the request. The
//! one hard failure is a directive containing control characters: it would
//! end up verbatim in a cache key and a `Location` header.

use crate::imaging::{OutputFormat, Quality};
use thiserror::Error;

/// Directive meaning "serve the source as-is".
pub const ORIGINAL: &str = "original";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("directive contains a control character at byte {0}")]
    ControlCharacter(usize),
}

/// Operations requested by a directive string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationSet {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<OutputFormat>,
    pub quality: Option<Quality>,
}

impl OperationSet {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a directive string into an [`OperationSet`].
pub fn parse(directive: &str) -> Result<OperationSet, DirectiveError> {
    if let Some(pos) = directive.find(char::is_control) {
        return Err(DirectiveError::ControlCharacter(pos));
    }

    let mut ops = OperationSet::default();
    if directive == ORIGINAL {
        return Ok(ops);
    }

    for token in directive.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        // A bare token is a flag without a value; no known key takes one.
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "width" => ops.width = parse_dimension(value),
            "height" => ops.height = parse_dimension(value),
            "quality" => ops.quality = value.parse().ok().map(Quality::new),
            "format" => ops.format = Some(OutputFormat::from_directive(value)),
            _ => {}
        }
    }

    Ok(ops)
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|&v| v > 0)
}

/// Render a directive as a query string: `width=1,height=2` → `width=1&height=2`.
pub fn to_query_string(directive: &str) -> String {
    directive.replace(',', "&")
}
