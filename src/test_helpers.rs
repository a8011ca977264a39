//! Shared test utilities: synthetic images and JPEG marker inspection.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let png = encode_png(&DynamicImage::ImageRgb8(noisy_rgb(64, 64, 1)));
//! let result = fit(&png, &FitOptions::new(1024)).unwrap();
//! assert!(has_marker(&result.bytes, 0xC2));
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// =========================================================================
// Synthetic images
// =========================================================================

/// Smooth diagonal gradient. Compresses well in every format.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([r, g, b])
    })
}

/// Deterministic per-pixel noise (xorshift). Compresses badly in every format.
pub fn noisy_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let [r, g, b, ..] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}

/// Encode any image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =========================================================================
// JPEG inspection
// =========================================================================

/// True if the JPEG header (everything before the first scan) contains
/// the marker `0xFF <marker>`.
///
/// Walks marker segments instead of scanning raw bytes, so table contents
/// cannot produce false positives.
pub fn has_marker(jpeg: &[u8], marker: u8) -> bool {
    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return false;
        }
        let code = jpeg[pos + 1];
        if code == marker {
            return true;
        }
        // Start of scan: header is over
        if code == 0xDA {
            return false;
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        pos += 2 + len;
    }
    false
}
