//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the transform executor in [`operations`](super::operations)
//! (which decides which stages run) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing executor logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`ResizeParams`]: Requested target box; either side may be omitted.
//! - [`EncodeParams`]: Output format plus the quality to honor, if any.

use super::format::OutputFormat;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Encoder-facing byte value; always within 1..=100.
    pub fn as_u8(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

/// Parameters for a resize. A missing side is derived from the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResizeParams {
    /// `None` when neither side was requested; the resize stage is skipped.
    pub fn requested(width: Option<u32>, height: Option<u32>) -> Option<Self> {
        (width.is_some() || height.is_some()).then_some(Self { width, height })
    }
}

/// Parameters for the final encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    /// Only ever set for lossy formats.
    pub quality: Option<Quality>,
}

impl EncodeParams {
    /// Quality the encoder should use: the requested one, or the format default.
    pub fn effective_quality(&self) -> Quality {
        self.quality.unwrap_or_else(|| self.format.default_quality())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
        assert_eq!(Quality::new(150).as_u8(), 100);
    }

    #[test]
    fn resize_requested_only_with_a_dimension() {
        assert_eq!(ResizeParams::requested(None, None), None);
        assert_eq!(
            ResizeParams::requested(Some(100), None),
            Some(ResizeParams {
                width: Some(100),
                height: None
            })
        );
    }

    #[test]
    fn effective_quality_falls_back_to_format_default() {
        let params = EncodeParams {
            format: OutputFormat::Avif,
            quality: None,
        };
        assert_eq!(params.effective_quality().value(), 50);

        let params = EncodeParams {
            format: OutputFormat::WebP,
            quality: Some(Quality::new(65)),
        };
        assert_eq!(params.effective_quality().value(), 65);
    }
}
