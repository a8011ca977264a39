//! Image processing: decode, resize, progressive JPEG encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Decode → RGB** | `image::load_from_memory` + `into_rgb8` |
//! | **Resize** | `image::imageops::resize` with `Lanczos3` |
//! | **Encode** | `mozjpeg` (progressive, optimized coding) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for resize-option math (unit testable)
//! - **Parameters**: [`Quality`], [`QualityLadder`], [`Dimensions`]
//! - **Codec**: [`JpegCodec`] trait + [`MozjpegCodec`]
//! - **Probe**: one measured encode attempt ([`probe`])
//! - **Operations**: decode/normalize/resize helpers

mod calculations;
pub mod codec;
pub mod mozjpeg_codec;
pub mod operations;
mod params;
pub mod probe;

pub use calculations::{ResizeKind, ResizeOption, calculate_resize_options, scale_to_width};
pub use codec::{CodecError, JpegCodec};
pub use mozjpeg_codec::MozjpegCodec;
pub use operations::{DecodeError, decode_rgb, get_dimensions, resize_exact};
pub use params::{DEFAULT_LADDER, Dimensions, Quality, QualityLadder};
pub use probe::{EncodingCandidate, probe};
