//! Codec probe: one encode attempt, measured.

use super::codec::{CodecError, JpegCodec};
use super::params::Quality;
use image::RgbImage;

/// The result of encoding one image at one quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingCandidate {
    pub quality: Quality,
    pub size_bytes: usize,
    pub payload: Vec<u8>,
}

impl EncodingCandidate {
    pub fn fits(&self, max_size_bytes: usize) -> bool {
        self.size_bytes <= max_size_bytes
    }
}

/// Encode `image` at `quality` and record the resulting size.
pub fn probe(
    codec: &impl JpegCodec,
    image: &RgbImage,
    quality: Quality,
) -> Result<EncodingCandidate, CodecError> {
    let payload = codec.encode(image, quality)?;
    Ok(EncodingCandidate {
        quality,
        size_bytes: payload.len(),
        payload,
    })
}
