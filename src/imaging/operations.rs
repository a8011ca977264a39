//! Decode, normalize and resize: the pixel work in front of the codec.
//!
//! Everything here runs on in-memory buffers. Only the first frame of a
//! multi-frame format is used.

use super::params::Dimensions;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
#[error("Unsupported or corrupt image: {0}")]
pub struct DecodeError(String);

impl From<image::ImageError> for DecodeError {
    fn from(e: image::ImageError) -> Self {
        Self(e.to_string())
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Read image dimensions from the header without decoding pixels.
pub fn get_dimensions(bytes: &[u8]) -> Result<Dimensions, DecodeError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(Dimensions::new(width, height))
}

/// Decode `bytes` and convert the result to 8-bit RGB.
///
/// Palette, grayscale, 16-bit and alpha images all end up as plain RGB.
/// Alpha is dropped, not composited.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(normalize(decoded))
}

/// Convert any decoded image to 8-bit RGB.
pub fn normalize(image: DynamicImage) -> RgbImage {
    let color = image.color();
    if color != ColorType::Rgb8 {
        debug!(?color, "normalizing to RGB8");
    }
    image.into_rgb8()
}

/// Resize to exactly `target` using Lanczos3. Aspect ratio is not preserved.
pub fn resize_exact(image: &RgbImage, target: Dimensions) -> RgbImage {
    if image.dimensions() == (target.width, target.height) {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, FilterType::Lanczos3)
}
