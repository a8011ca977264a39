//! mozjpeg-backed progressive JPEG encoder.
//!
//! ## Encoding policy
//!
//! | Setting | Value |
//! |---|---|
//! | Input | interleaved 8-bit RGB (`JCS_RGB`) |
//! | Scan layout | progressive (`set_progressive_mode`) |
//! | Huffman tables | optimized per image (`set_optimize_coding`) |
//! | Scan script | optimized (`set_optimize_scans`) |
//! | Chroma | mozjpeg default (4:2:0) |
//!
//! The policy is fixed: callers only choose the quality. libjpeg reports fatal
//! errors by unwinding, so each encode runs under `catch_unwind` and a panic
//! becomes a [`CodecError`].

use super::codec::{CodecError, JpegCodec};
use super::params::Quality;
use image::RgbImage;
use mozjpeg::{ColorSpace, Compress};
use std::panic::{self, AssertUnwindSafe};

/// Production codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MozjpegCodec;

impl MozjpegCodec {
    pub fn new() -> Self {
        Self
    }
}

impl JpegCodec for MozjpegCodec {
    fn encode(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidImage {
                width,
                height,
                reason: "zero-sized image".into(),
            });
        }

        let pixels: &[u8] = image.as_raw();
        let expected_len = width as usize * height as usize * 3;
        if pixels.len() != expected_len {
            return Err(CodecError::InvalidImage {
                width,
                height,
                reason: format!(
                    "pixel buffer is {} bytes, expected {expected_len}",
                    pixels.len()
                ),
            });
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            compress(pixels, width, height, quality)
        }));

        match outcome {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(CodecError::EncodeFailed {
                quality,
                reason: e.to_string(),
            }),
            Err(payload) => Err(CodecError::EncodeFailed {
                quality,
                reason: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn compress(pixels: &[u8], width: u32, height: u32, quality: Quality) -> std::io::Result<Vec<u8>> {
    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality.value() as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_optimize_scans(true);

    // ~10% of raw RGB is a reasonable first guess for photographic content
    let estimated = (pixels.len() / 10).max(4096);
    let mut started = comp.start_compress(Vec::with_capacity(estimated))?;
    started.write_scanlines(pixels)?;
    started.finish()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "libjpeg aborted".to_string()
    }
}
