//! Output formats and content-type mapping.
//!
//! | Format | Content type | Lossy | Default quality |
//! |---|---|---|---|
//! | JPEG | `image/jpeg` | yes | 80 |
//! | WebP | `image/webp` | yes | 80 |
//! | AVIF | `image/avif` | yes | 50 |
//! | PNG | `image/png` | no | - |
//! | GIF | `image/gif` | no | - |

use super::params::Quality;
use image::ImageFormat;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An encoding the handler can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Gif,
    WebP,
    Png,
    Avif,
}

impl OutputFormat {
    /// Map a `format=` directive value. Unrecognized values fall back to JPEG.
    pub fn from_directive(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gif" => Self::Gif,
            "webp" => Self::WebP,
            "png" => Self::Png,
            "avif" => Self::Avif,
            _ => Self::Jpeg,
        }
    }

    /// Map a `Content-Type` header value, ignoring parameters and case.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match media_type(content_type).as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            "image/png" => Some(Self::Png),
            "image/avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Map a container format detected by the `image` crate.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Png => "image/png",
            Self::Avif => "image/avif",
        }
    }

    /// Whether `quality` materially affects the encoding.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP | Self::Avif)
    }

    /// Quality used when a lossy format is requested without `quality=`.
    pub fn default_quality(self) -> Quality {
        match self {
            Self::Avif => Quality::new(50),
            _ => Quality::new(80),
        }
    }
}

/// Lowercased media type without parameters (`"image/PNG; q=1"` → `"image/png"`).
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_svg_content_type(content_type: &str) -> bool {
    media_type(content_type) == SVG_CONTENT_TYPE
}

/// Sniff SVG markup: an `<svg` root, optionally behind an XML prolog.
pub fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Sniff an ISO-BMFF container with an AVIF brand.
pub fn looks_like_avif(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && matches!(&bytes[8..12], b"avif" | b"avis")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_values_map_to_formats() {
        assert_eq!(OutputFormat::from_directive("webp"), OutputFormat::WebP);
        assert_eq!(OutputFormat::from_directive("PNG"), OutputFormat::Png);
        assert_eq!(OutputFormat::from_directive("jpg"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_directive("avif"), OutputFormat::Avif);
        assert_eq!(OutputFormat::from_directive("gif"), OutputFormat::Gif);
    }

    #[test]
    fn unknown_directive_format_is_jpeg() {
        assert_eq!(OutputFormat::from_directive("bmp"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_directive(""), OutputFormat::Jpeg);
    }

    #[test]
    fn content_type_ignores_parameters_and_case() {
        assert_eq!(
            OutputFormat::from_content_type("Image/PNG; charset=binary"),
            Some(OutputFormat::Png)
        );
        assert_eq!(
            OutputFormat::from_content_type("image/jpg"),
            Some(OutputFormat::Jpeg)
        );
        assert_eq!(OutputFormat::from_content_type("image/tiff"), None);
        assert_eq!(OutputFormat::from_content_type(""), None);
    }

    #[test]
    fn lossy_formats() {
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(OutputFormat::WebP.is_lossy());
        assert!(OutputFormat::Avif.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
        assert!(!OutputFormat::Gif.is_lossy());
    }

    #[test]
    fn svg_detection() {
        assert!(is_svg_content_type("image/svg+xml"));
        assert!(is_svg_content_type("IMAGE/SVG+XML;charset=utf-8"));
        assert!(!is_svg_content_type("image/png"));

        assert!(looks_like_svg(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"));
        assert!(looks_like_svg(
            b"<?xml version=\"1.0\"?>\n<svg width=\"1\" height=\"1\"></svg>"
        ));
        assert!(!looks_like_svg(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn avif_brand_detection() {
        let mut header = vec![0, 0, 0, 0x1c];
        header.extend_from_slice(b"ftypavif");
        assert!(looks_like_avif(&header));
        assert!(!looks_like_avif(b"short"));
    }
}
