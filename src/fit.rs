//! Size-fitting engine.
//!
//! Turns arbitrary image bytes into a JPEG no larger than a byte budget,
//! keeping as much quality as the budget allows.
//!
//! ## Decision sequence
//!
//! ```text
//! fast-path check ──fits──▶ return input unchanged (quality 100)
//!        │
//!     decode + normalize to RGB
//!        │
//!   [resize requested] ──▶ resize, encode at 100 ──fits──▶ return (quality 100)
//!        │
//!   probe every ladder quality in parallel
//!        │
//!   select: highest fitting quality, else the ladder floor
//! ```
//!
//! The fast path never decodes, so metadata and odd-but-valid encodings of
//! small inputs survive byte for byte. Everything after it produces a
//! progressive JPEG.
//!
//! ## Failure
//!
//! Decode failures and encoder failures abort the call. An unreachable budget
//! does not: the lowest ladder quality is returned even if it is still too
//! large.

use crate::imaging::{
    CodecError, DecodeError, Dimensions, EncodingCandidate, JpegCodec, MozjpegCodec, Quality,
    QualityLadder, decode_rgb, probe, resize_exact,
};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Default byte budget: 400 KiB.
pub const DEFAULT_MAX_SIZE_BYTES: usize = 400 * 1024;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Encoding failed: {0}")]
    Codec(#[from] CodecError),
}

/// Parameters for one `fit` call.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_size_bytes: usize,
    pub ladder: QualityLadder,
    /// Exact output dimensions. `None` keeps the source size.
    pub target: Option<Dimensions>,
}

impl FitOptions {
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ladder: QualityLadder::default(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: Dimensions) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_ladder(mut self, ladder: QualityLadder) -> Self {
        self.ladder = ladder;
        self
    }

    fn validate(&self) -> Result<(), FitError> {
        if self.max_size_bytes == 0 {
            return Err(FitError::InvalidRequest(
                "max_size_bytes must be positive".into(),
            ));
        }
        if let Some(target) = self.target
            && !target.is_valid()
        {
            return Err(FitError::InvalidRequest(format!(
                "target dimensions must be positive, got {target}"
            )));
        }
        Ok(())
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES)
    }
}

/// Output of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub bytes: Vec<u8>,
    /// Length of the input buffer.
    pub original_size: usize,
    /// Length of `bytes`.
    pub final_size: usize,
    /// Encoder quality that produced `bytes`; 100 for the unchanged fast path.
    pub quality: Quality,
    /// True when `bytes` is the input itself (fast path, nothing encoded).
    pub passthrough: bool,
}

impl ProcessingResult {
    fn unchanged(raw: &[u8]) -> Self {
        Self {
            bytes: raw.to_vec(),
            original_size: raw.len(),
            final_size: raw.len(),
            quality: Quality::MAX,
            passthrough: true,
        }
    }

    fn from_candidate(original_size: usize, candidate: EncodingCandidate) -> Self {
        Self {
            final_size: candidate.size_bytes,
            quality: candidate.quality,
            bytes: candidate.payload,
            original_size,
            passthrough: false,
        }
    }

    pub fn was_reencoded(&self) -> bool {
        !self.passthrough
    }
}

/// Fit `raw` into `options.max_size_bytes` using the mozjpeg codec.
pub fn fit(raw: &[u8], options: &FitOptions) -> Result<ProcessingResult, FitError> {
    fit_with_codec(&MozjpegCodec::new(), raw, options)
}

/// Fit using a specific codec (allows testing with mock).
pub fn fit_with_codec(
    codec: &impl JpegCodec,
    raw: &[u8],
    options: &FitOptions,
) -> Result<ProcessingResult, FitError> {
    options.validate()?;
    let original_size = raw.len();
    let max = options.max_size_bytes;

    if options.target.is_none() && original_size <= max {
        debug!(original_size, max, "fast path: input already fits");
        return Ok(ProcessingResult::unchanged(raw));
    }

    let mut image = decode_rgb(raw)?;

    if let Some(target) = options.target {
        image = resize_exact(&image, target);
        let candidate = probe(codec, &image, Quality::MAX)?;
        if candidate.fits(max) {
            debug!(%target, size = candidate.size_bytes, max, "resize alone fits at quality 100");
            return Ok(ProcessingResult::from_candidate(original_size, candidate));
        }
        debug!(%target, size = candidate.size_bytes, max, "resize alone too large, probing ladder");
    }

    let candidates = probe_ladder(codec, &image, &options.ladder)?;
    let selected = select_candidate(candidates, max)
        .ok_or_else(|| FitError::InvalidRequest("quality ladder is empty".into()))?;

    debug!(
        quality = %selected.quality,
        size = selected.size_bytes,
        max,
        fits = selected.fits(max),
        "ladder selection"
    );
    Ok(ProcessingResult::from_candidate(original_size, selected))
}

/// Encode `image` at every ladder step in parallel.
///
/// Any failing probe fails the whole ladder.
pub fn probe_ladder(
    codec: &impl JpegCodec,
    image: &image::RgbImage,
    ladder: &QualityLadder,
) -> Result<Vec<EncodingCandidate>, CodecError> {
    ladder
        .steps()
        .par_iter()
        .map(|&quality| probe(codec, image, quality))
        .collect()
}

/// Pick the highest-quality candidate within `max_size_bytes`.
///
/// When nothing fits, the lowest-quality candidate is returned instead.
/// Returns `None` only for an empty candidate set.
pub fn select_candidate(
    candidates: Vec<EncodingCandidate>,
    max_size_bytes: usize,
) -> Option<EncodingCandidate> {
    let (fitting, too_large): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.fits(max_size_bytes));

    fitting
        .into_iter()
        .max_by_key(|c| c.quality)
        .or_else(|| too_large.into_iter().min_by_key(|c| c.quality))
}
