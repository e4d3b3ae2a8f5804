//! AVIF decoding via `avif-parse` (container) + `rav1d` (AV1 bitstream).
//!
//! The `image` crate's `"avif"` feature only provides the encoder (rav1e).
//! Its decoder needs `"avif-native"`, which links the C library dav1d, so
//! sources in AVIF go through `rav1d` (a pure Rust port of dav1d) instead.

use super::backend::BackendError;
use super::calculations::{MAX_PIXELS, fits_pixel_budget};
use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;
use std::ptr::NonNull;

/// Runs the closure on drop; releases rav1d handles on every exit path.
struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

fn failed(what: &str, code: i32) -> BackendError {
    BackendError::Decode(format!("rav1d {what} failed ({code})"))
}

/// Decode an in-memory AVIF file to RGB8.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| BackendError::Decode(format!("Failed to parse AVIF container: {e:?}")))?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;
    // rav1d refuses larger frames before allocating them
    settings.frame_size_limit = MAX_PIXELS as _;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed("open", rc.0));
    }
    let ctx_slot: *mut _ = &mut ctx;
    let _close = OnDrop(move || unsafe {
        dav1d::dav1d_close(NonNull::new(ctx_slot));
    });

    let mut data = Dav1dData::default();
    let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
    if buf.is_null() {
        return Err(BackendError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
        return Err(failed("send_data", rc.0));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        return Err(failed("get_picture", rc.0));
    }
    let pic_slot: *mut Dav1dPicture = &mut pic;
    let _unref = OnDrop(move || unsafe {
        dav1d::dav1d_picture_unref(NonNull::new(pic_slot));
    });

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    if !fits_pixel_budget(width, height) {
        return Err(BackendError::Decode(format!(
            "AVIF frame {width}x{height} exceeds the {MAX_PIXELS} pixel limit"
        )));
    }
    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::Decode(format!("AVIF picture is missing plane {i}")))
    };
    let y_ptr = plane(0)?;

    let planes = if pic.p.layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvPlanes {
            y: y_ptr,
            u: y_ptr,
            v: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width,
            height,
            bpc: pic.p.bpc as u32,
            subsample: (false, false),
            monochrome: true,
        }
    } else {
        let subsample = match pic.p.layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            other => {
                return Err(BackendError::Decode(format!(
                    "Unsupported AVIF pixel layout: {other}"
                )));
            }
        };
        YuvPlanes {
            y: y_ptr,
            u: plane(1)?,
            v: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width,
            height,
            bpc: pic.p.bpc as u32,
            subsample,
            monochrome: false,
        }
    };

    let rgb = planes.to_rgb();
    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("Decoded AVIF buffer has the wrong size".into()))
}

/// Borrowed YUV planes of a decoded picture.
struct YuvPlanes {
    y: *const u8,
    u: *const u8,
    v: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling (horizontal, vertical); I420 = (true, true).
    subsample: (bool, bool),
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in 0..self.height {
            for col in 0..self.width {
                let luma = sample(self.y, self.y_stride, col, row, self.bpc);
                let (r, g, b) = if self.monochrome {
                    (luma, luma, luma)
                } else {
                    let cx = if self.subsample.0 { col / 2 } else { col };
                    let cy = if self.subsample.1 { row / 2 } else { row };
                    let cb = sample(self.u, self.uv_stride, cx, cy, self.bpc) - center;
                    let cr = sample(self.v, self.uv_stride, cx, cy, self.bpc) - center;
                    (
                        luma + 1.402 * cr,
                        luma - 0.344136 * cb - 0.714136 * cr,
                        luma + 1.772 * cb,
                    )
                };
                for channel in [r, g, b] {
                    rgb.push((channel * scale).clamp(0.0, 255.0) as u8);
                }
            }
        }
        rgb
    }
}

/// One sample from a plane; 10/12-bit content is stored as u16.
#[inline]
fn sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let offset = y as isize * stride + x as isize * 2;
        (unsafe { (ptr.offset(offset) as *const u16).read_unaligned() }) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    fn encode_test_avif(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut out, 10, 80)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn decodes_encoder_output() {
        let bytes = encode_test_avif(64, 48);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode(b"not an avif"),
            Err(BackendError::Decode(_))
        ));
    }
}
