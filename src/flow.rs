//! Chat side of the staged upload flow.
//!
//! After [`crate::upload::UploadHandler`] parks an image and offers resize
//! options, the user answers in the chat with one of them. This module turns
//! that answer into a processed file and packages it for delivery.

use crate::fit::{FitError, FitOptions, ProcessingResult, fit_with_codec};
use crate::imaging::{JpegCodec, MozjpegCodec, ResizeOption};
use crate::output::format_caption;
use crate::staging::StagingStore;
use crate::types::UserKey;
use std::io;
use thiserror::Error;
use tracing::info;

/// File name every processed image is delivered under.
pub const DELIVERY_FILENAME: &str = "processed_image.jpg";

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("No image is waiting for user {0}")]
    NothingStaged(UserKey),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error("Staging failed: {0}")]
    Staging(#[from] io::Error),
}

/// Finish a staged upload with the size the user picked.
pub fn complete_resize_choice(
    staging: &StagingStore,
    user: UserKey,
    choice: &ResizeOption,
    options: &FitOptions,
) -> Result<ProcessingResult, FlowError> {
    complete_resize_choice_with_codec(&MozjpegCodec::new(), staging, user, choice, options)
}

pub fn complete_resize_choice_with_codec(
    codec: &impl JpegCodec,
    staging: &StagingStore,
    user: UserKey,
    choice: &ResizeOption,
    options: &FitOptions,
) -> Result<ProcessingResult, FlowError> {
    let staged = staging.get(user)?.ok_or(FlowError::NothingStaged(user))?;

    let target = choice.dimensions();
    let mut options = options.clone();
    // Picking the source size means no resize at all
    options.target = match staged.dimensions {
        Some(source) if source == target => None,
        _ => Some(target),
    };

    let result = fit_with_codec(codec, &staged.bytes, &options)?;
    staging.delete(user)?;
    info!(%user, %target, quality = %result.quality, final_size = result.final_size, "completed resize choice");
    Ok(result)
}

/// A processed file ready to hand to the chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    pub caption: String,
}

impl Delivery {
    pub fn from_result(result: ProcessingResult) -> Self {
        let caption = format_caption(&result);
        Self {
            file_name: DELIVERY_FILENAME,
            bytes: result.bytes,
            caption,
        }
    }
}
