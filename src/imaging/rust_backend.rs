//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` + `rav1d`, see [`avif`](super::avif) |
//! | Rasterize (SVG) | `resvg` at the document's intrinsic size, system fonts for `<text>` |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `resize_exact` / `resize_to_fill` with `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → AVIF | `AvifEncoder` (rav1e) |
//! | Encode → WebP | `WebPEncoder::new_lossless` (quality has no effect) |
//! | Encode → PNG, GIF | `DynamicImage::write_to` |
//!
//! Every stage that allocates pixels checks the target size against
//! [`MAX_PIXELS`] first, so a hostile header or directive fails the request
//! instead of the process.

use super::avif;
use super::backend::{BackendError, Decoded, ImageBackend};
use super::calculations::{MAX_PIXELS, ResizePlan, fits_pixel_budget, peak_pixels, plan_resize};
use super::format::{OutputFormat, looks_like_avif};
use super::params::{EncodeParams, ResizeParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use resvg::{tiny_skia, usvg};
use std::io::Cursor;
use std::sync::Arc;

/// rav1e speed preset for AVIF output (0 slowest … 10 fastest).
const DEFAULT_AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    avif_speed: u8,
    /// Loaded once; every SVG parse shares it.
    fontdb: Arc<usvg::fontdb::Database>,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_avif_speed(DEFAULT_AVIF_SPEED)
    }

    /// Trade AVIF encode time for size; clamped to rav1e's 0..=10.
    pub fn with_avif_speed(speed: u8) -> Self {
        Self {
            avif_speed: speed.min(10),
            fontdb: Arc::new(system_fontdb()),
        }
    }

    fn parse_svg(&self, bytes: &[u8]) -> Result<usvg::Tree, BackendError> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        usvg::Tree::from_data(bytes, &options)
            .map_err(|e| BackendError::Decode(format!("Failed to parse SVG: {e}")))
    }

    /// Rasterize an SVG document at its intrinsic size.
    fn rasterize_svg(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        let tree = self.parse_svg(bytes)?;
        let size = tree.size().to_int_size();
        let (width, height) = (size.width(), size.height());
        check_budget("SVG", width, height)?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            BackendError::Decode(format!("SVG has an unusable size {width}x{height}"))
        })?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        // tiny-skia stores premultiplied alpha
        let mut rgba = Vec::with_capacity(pixmap.data().len());
        for px in pixmap.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        image::RgbaImage::from_raw(width, height, rgba)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| BackendError::Decode("Rasterized SVG buffer has the wrong size".into()))
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_err(e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode(e.to_string())
}

fn encode_err(format: OutputFormat, e: impl std::fmt::Display) -> BackendError {
    BackendError::Encode(format!("{} encode failed: {e}", format.content_type()))
}

fn system_fontdb() -> usvg::fontdb::Database {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    db
}

/// Reject a decoded size over [`MAX_PIXELS`] before anything is allocated.
fn check_budget(what: &str, width: u32, height: u32) -> Result<(), BackendError> {
    if fits_pixel_budget(width, height) {
        return Ok(());
    }
    Err(BackendError::Decode(format!(
        "{what} is {width}x{height}, over the {MAX_PIXELS} pixel limit"
    )))
}

/// Decode a raster container with the `image` crate, keeping EXIF orientation.
fn decode_raster(bytes: &[u8]) -> Result<Decoded<DynamicImage>, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(decode_err)?;
    let detected = reader.format().and_then(OutputFormat::from_image_format);
    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    let (width, height) = decoder.dimensions();
    check_budget("Image", width, height)?;
    // Unreadable EXIF is treated as "no orientation", not as a broken image.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    Ok(Decoded {
        image,
        orientation,
        detected,
    })
}

/// 8-bit RGB or RGBA depending on whether the source carries alpha.
fn to_8bit(img: &DynamicImage) -> (Vec<u8>, ExtendedColorType) {
    if img.color().has_alpha() {
        (img.to_rgba8().into_raw(), ExtendedColorType::Rgba8)
    } else {
        (img.to_rgb8().into_raw(), ExtendedColorType::Rgb8)
    }
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8], vector: bool) -> Result<Decoded<DynamicImage>, BackendError> {
        if vector {
            return Ok(Decoded {
                image: self.rasterize_svg(bytes)?,
                orientation: Orientation::NoTransforms,
                detected: None,
            });
        }
        if looks_like_avif(bytes) {
            return Ok(Decoded {
                image: avif::decode(bytes)?,
                orientation: Orientation::NoTransforms,
                detected: Some(OutputFormat::Avif),
            });
        }
        decode_raster(bytes)
    }

    fn resize(
        &self,
        image: DynamicImage,
        params: &ResizeParams,
    ) -> Result<DynamicImage, BackendError> {
        let source = (image.width(), image.height());
        let plan = plan_resize(source, params.width, params.height);
        if peak_pixels(source, plan) > MAX_PIXELS {
            return Err(BackendError::ProcessingFailed(format!(
                "resizing {}x{} to {:?}x{:?} needs more than {MAX_PIXELS} pixels",
                source.0, source.1, params.width, params.height
            )));
        }
        Ok(match plan {
            ResizePlan::Keep => image,
            ResizePlan::Exact { width, height } => {
                image.resize_exact(width, height, FilterType::Lanczos3)
            }
            ResizePlan::Fill { width, height } => {
                image.resize_to_fill(width, height, FilterType::Lanczos3)
            }
        })
    }

    fn orient(
        &self,
        mut image: DynamicImage,
        orientation: Orientation,
    ) -> Result<DynamicImage, BackendError> {
        image.apply_orientation(orientation);
        Ok(image)
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let format = params.format;
        let quality = params.effective_quality().as_u8();
        let (width, height) = (image.width(), image.height());
        let mut out = Cursor::new(Vec::new());

        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut out, quality)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::Avif => {
                let (pixels, color) = to_8bit(image);
                AvifEncoder::new_with_speed_quality(&mut out, self.avif_speed, quality)
                    .write_image(&pixels, width, height, color)
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::WebP => {
                let (pixels, color) = to_8bit(image);
                WebPEncoder::new_lossless(&mut out)
                    .write_image(&pixels, width, height, color)
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::Png => {
                // PNG has no float sample type
                let widened;
                let img = match image {
                    DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                        widened = DynamicImage::ImageRgba16(image.to_rgba16());
                        &widened
                    }
                    other => other,
                };
                img.write_to(&mut out, ImageFormat::Png)
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::Gif => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut out, ImageFormat::Gif)
                    .map_err(|e| encode_err(format, e))?;
            }
        }

        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{GenericImageView, RgbImage, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn encode(format: OutputFormat, quality: Option<u32>) -> Vec<u8> {
        RustBackend::new()
            .encode(
                &gradient(64, 48),
                &EncodeParams {
                    format,
                    quality: quality.map(Quality::new),
                },
            )
            .unwrap()
    }

    #[test]
    fn decode_png_detects_format_and_default_orientation() {
        let decoded = RustBackend::new()
            .decode(&png_bytes(&gradient(40, 30)), false)
            .unwrap();
        assert_eq!(decoded.image.dimensions(), (40, 30));
        assert_eq!(decoded.detected, Some(OutputFormat::Png));
        assert_eq!(decoded.orientation, Orientation::NoTransforms);
    }

    #[test]
    fn decode_garbage_errors() {
        let result = RustBackend::new().decode(b"definitely not an image", false);
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_svg_rasterizes_at_intrinsic_size() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
            <rect width="20" height="10" fill="#ff0000"/></svg>"##;
        let decoded = RustBackend::new().decode(svg, true).unwrap();
        assert_eq!(decoded.image.dimensions(), (20, 10));
        assert_eq!(decoded.detected, None);
        let px = decoded.image.to_rgba8().get_pixel(5, 5).0;
        assert_eq!(px, [255, 0, 0, 255]);
    }

    #[test]
    fn decode_reads_exif_orientation() {
        let jpeg = crate::test_helpers::jpeg_with_orientation(40, 30, 6);
        let decoded = RustBackend::new().decode(&jpeg, false).unwrap();
        assert_eq!(decoded.image.dimensions(), (40, 30));
        assert_eq!(decoded.detected, Some(OutputFormat::Jpeg));
        assert_eq!(decoded.orientation, Orientation::Rotate90);
    }

    #[test]
    fn svg_parse_uses_shared_fontdb() {
        let backend = RustBackend::new();
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="80" height="20">
            <text x="2" y="15" font-size="12">hello</text></svg>"#;
        let tree = backend.parse_svg(svg).unwrap();
        assert!(Arc::ptr_eq(tree.fontdb(), &backend.fontdb));
        assert!(backend.decode(svg, true).is_ok());
    }

    #[test]
    fn oversized_svg_is_rejected_before_rasterizing() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="100000" height="100000"/>"#;
        let result = RustBackend::new().decode(svg, true);
        assert!(matches!(result, Err(BackendError::Decode(msg)) if msg.contains("pixel limit")));
    }

    #[test]
    fn resize_over_pixel_budget_fails() {
        let backend = RustBackend::new();
        for (width, height) in [
            (Some(4_000_000_000), None),
            (None, Some(4_000_000_000)),
            (Some(100_000), Some(100_000)),
        ] {
            let result = backend.resize(gradient(8, 6), &ResizeParams { width, height });
            assert!(
                matches!(result, Err(BackendError::ProcessingFailed(_))),
                "{width:?}x{height:?}"
            );
        }
    }

    #[test]
    fn decode_avif_source() {
        let avif = encode(OutputFormat::Avif, Some(80));
        let decoded = RustBackend::new().decode(&avif, false).unwrap();
        assert_eq!(decoded.image.dimensions(), (64, 48));
        assert_eq!(decoded.detected, Some(OutputFormat::Avif));
    }

    #[test]
    fn resize_width_only_keeps_aspect() {
        let resized = RustBackend::new()
            .resize(
                gradient(400, 300),
                &ResizeParams {
                    width: Some(100),
                    height: None,
                },
            )
            .unwrap();
        assert_eq!(resized.dimensions(), (100, 75));
    }

    #[test]
    fn resize_both_dimensions_crops_to_box() {
        let resized = RustBackend::new()
            .resize(
                gradient(400, 300),
                &ResizeParams {
                    width: Some(100),
                    height: Some(100),
                },
            )
            .unwrap();
        assert_eq!(resized.dimensions(), (100, 100));
    }

    #[test]
    fn orient_rotate90_swaps_dimensions() {
        let rotated = RustBackend::new()
            .orient(gradient(40, 30), Orientation::Rotate90)
            .unwrap();
        assert_eq!(rotated.dimensions(), (30, 40));
    }

    #[test]
    fn every_format_encodes_and_redecodes() {
        for format in [
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::Gif,
            OutputFormat::WebP,
        ] {
            let bytes = encode(format, None);
            let guessed = image::guess_format(&bytes).unwrap();
            assert_eq!(OutputFormat::from_image_format(guessed), Some(format));
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (64, 48), "{format:?}");
        }
        let avif = encode(OutputFormat::Avif, None);
        assert!(looks_like_avif(&avif));
    }

    #[test]
    fn jpeg_quality_changes_output() {
        let low = encode(OutputFormat::Jpeg, Some(10));
        let high = encode(OutputFormat::Jpeg, Some(95));
        assert!(low.len() < high.len());
    }

    #[test]
    fn jpeg_encodes_images_with_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 4])));
        let bytes = RustBackend::new()
            .encode(
                &rgba,
                &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: None,
                },
            )
            .unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(
            encode(OutputFormat::Jpeg, Some(70)),
            encode(OutputFormat::Jpeg, Some(70))
        );
        assert_eq!(encode(OutputFormat::Png, None), encode(OutputFormat::Png, None));
    }
}
