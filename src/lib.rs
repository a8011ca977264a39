//! # jpeg-fit
//!
//! Fits images under a byte budget as progressive JPEGs. Chat bots and upload
//! forms often cap attachments at a few hundred kilobytes; jpeg-fit takes any
//! decodable image and returns the best-looking JPEG that stays under the cap.
//!
//! # Architecture: Engine Plus Collaborators
//!
//! ```text
//!            ┌────────── upload form ──────────┐
//! token ──▶  UploadHandler ──Direct──▶ fit ──▶ ProcessingResult ──▶ Delivery
//!                 │                     ▲
//!            ChooseSize                 │ target dimensions
//!                 ▼                     │
//!           StagingStore ──▶ complete_resize_choice (chat answer)
//! ```
//!
//! The engine ([`fit`]) is a pure function from bytes and options to a
//! result. Everything around it (tokens, staging, fetching) is ordinary
//! values built from [`config::AppConfig`] and passed in; there is no global
//! state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fit`] | The engine: fast path, optional resize, quality ladder, selection |
//! | [`imaging`] | Decode, resize, resize options, the [`imaging::JpegCodec`] seam and mozjpeg |
//! | [`config`] | `config.toml` loading, stock defaults, env overrides, validation |
//! | [`types`] | Shared identity ([`types::UserKey`]) and the access list |
//! | [`token`] | Signed, expiring upload-link tokens |
//! | [`staging`] | Per-user parking of uploads awaiting a size choice |
//! | [`upload`] | Upload-form backend: size and token checks, then fit or stage |
//! | [`flow`] | Chat side: finish a staged upload, package it for delivery |
//! | [`source`] | Fetch source bytes from a URL or read them from disk |
//! | [`output`] | CLI and caption text |
//!
//! # Design Decisions
//!
//! ## Probe the Whole Ladder
//!
//! Every ladder quality is encoded, in parallel on the rayon pool, and the
//! highest one that fits wins. JPEG size is not strictly monotonic in
//! quality for every image, so stopping at the first fit could miss a better
//! candidate, and a parallel sweep costs about as much wall time as one
//! encode.
//!
//! ## Progressive Output via mozjpeg
//!
//! The `image` crate only writes baseline JPEG. [`imaging::MozjpegCodec`]
//! wraps mozjpeg with progressive scans and optimized Huffman tables, which
//! also tends to shave a few percent off every probe.
//!
//! ## Fast Path Keeps Bytes
//!
//! Input already under the budget is returned byte for byte, whatever its
//! format. Nothing is decoded, so EXIF, ICC profiles and alpha channels
//! survive. A requested resize disables the fast path.
//!
//! ## Graceful Degradation
//!
//! An unreachable budget is not an error: the lowest ladder quality is
//! returned and the caller can compare `final_size` with the budget.

pub mod config;
pub mod fit;
pub mod flow;
pub mod imaging;
pub mod output;
pub mod source;
pub mod staging;
pub mod token;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
