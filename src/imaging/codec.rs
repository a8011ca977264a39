//! JPEG codec trait and shared error type.
//!
//! The [`JpegCodec`] trait is the single seam between the size-fitting engine
//! and the encoder: one operation, "compress these RGB pixels at this
//! quality". The production implementation is
//! [`MozjpegCodec`](super::mozjpeg_codec::MozjpegCodec), which always writes
//! progressive, Huffman-optimized output.
//!
//! Tests swap in the recording [`tests::MockCodec`] to count probes and to
//! control output sizes without touching a real encoder.

use super::params::Quality;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Cannot encode {width}x{height} image: {reason}")]
    InvalidImage {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("Encoder failed at quality {quality}: {reason}")]
    EncodeFailed { quality: Quality, reason: String },
}

/// Trait for JPEG encoders.
///
/// Implementations must be deterministic for a fixed (image, quality) pair and
/// must be `Sync`: the engine calls `encode` from several rayon workers at
/// once against the same image.
pub trait JpegCodec: Sync {
    /// Compress `image` at `quality`, returning the complete JPEG file.
    fn encode(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, CodecError>;
}
