//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Largest image, in pixels, any stage may allocate: decode, rasterize or
/// resample. A 40-megapixel photo fits; `width=4000000000` does not.
pub const MAX_PIXELS: u64 = 40_000_000;

/// True when a `width`×`height` buffer stays within [`MAX_PIXELS`].
pub fn fits_pixel_budget(width: u32, height: u32) -> bool {
    width as u64 * height as u64 <= MAX_PIXELS
}

/// How the backend should resample for a requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Requested box equals the source; nothing to do.
    Keep,
    /// Resample to exactly these dimensions (aspect already preserved).
    Exact { width: u32, height: u32 },
    /// Cover the box and center-crop the overflow.
    Fill { width: u32, height: u32 },
}

/// Plan a resize from the source dimensions and the requested sides.
///
/// - Only `width`: height is derived from the source aspect ratio.
/// - Only `height`: width is derived from the source aspect ratio.
/// - Both: the image covers the box and is center-cropped.
///
/// Derived sides never round below 1px.
///
/// # Examples
/// ```
/// # use image_handler::imaging::calculations::{plan_resize, ResizePlan};
/// // 400x300 with width 100 → 100x75
/// assert_eq!(
///     plan_resize((400, 300), Some(100), None),
///     ResizePlan::Exact { width: 100, height: 75 }
/// );
/// ```
pub fn plan_resize(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> ResizePlan {
    let (src_w, src_h) = source;
    let target = match (width, height) {
        (None, None) => return ResizePlan::Keep,
        (Some(w), None) => (w, scale_side(src_h, w, src_w)),
        (None, Some(h)) => (scale_side(src_w, h, src_h), h),
        (Some(w), Some(h)) => {
            if (w, h) == source {
                return ResizePlan::Keep;
            }
            return ResizePlan::Fill {
                width: w,
                height: h,
            };
        }
    };

    if target == source {
        ResizePlan::Keep
    } else {
        ResizePlan::Exact {
            width: target.0,
            height: target.1,
        }
    }
}

/// Pixels of the largest buffer carrying out `plan` allocates.
///
/// Resampling runs one axis at a time, so the intermediate pass holds
/// `new_width × source_height` or `source_width × new_height` pixels. `Fill`
/// resamples to the covering size before cropping.
pub fn peak_pixels(source: (u32, u32), plan: ResizePlan) -> u64 {
    let (src_w, src_h) = (source.0 as u64, source.1 as u64);
    let (new_w, new_h) = match plan {
        ResizePlan::Keep => return src_w * src_h,
        ResizePlan::Exact { width, height } => (width as u64, height as u64),
        ResizePlan::Fill { width, height } => cover_size(source, width, height),
    };
    (new_w * new_h).max(new_w * src_h).max(src_w * new_h)
}

/// Smallest size with the source aspect ratio covering `width`×`height`.
fn cover_size(source: (u32, u32), width: u32, height: u32) -> (u64, u64) {
    let (src_w, src_h) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let ratio = (width as f64 / src_w).max(height as f64 / src_h);
    // f64 → u64 saturates, so absurd ratios stay comparable
    ((src_w * ratio).ceil() as u64, (src_h * ratio).ceil() as u64)
}

/// `side * numerator / denominator`, rounded, at least 1.
fn scale_side(side: u32, numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return numerator.max(1);
    }
    let scaled = (side as f64 * numerator as f64 / denominator as f64).round();
    (scaled as u32).max(1)
}
