//! Backend of the web upload form.
//!
//! A chat user receives a link carrying a token; the form posts the file
//! together with that token. The handler checks size and token, then either
//! fits the image straight away or parks it in staging so the user can pick
//! an output size from the chat.
//!
//! Transport (HTTP routing, multipart parsing) lives outside this crate; the
//! handler takes the already-extracted token and bytes.

use crate::config::AppConfig;
use crate::fit::{FitError, FitOptions, ProcessingResult, fit_with_codec};
use crate::imaging::{JpegCodec, MozjpegCodec, ResizeOption, calculate_resize_options, get_dimensions};
use crate::staging::StagingStore;
use crate::token::TokenRegistry;
use crate::types::UserKey;
use std::io;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("Upload link is invalid or expired")]
    Auth,
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error("Staging failed: {0}")]
    Staging(#[from] io::Error),
}

impl UploadError {
    /// HTTP status the form endpoint should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::TooLarge { .. } => 413,
            UploadError::Auth => 401,
            UploadError::Fit(_) => 422,
            UploadError::Staging(_) => 500,
        }
    }
}

/// What the user asked the form to do with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFlow {
    /// Fit at the source size right away.
    Direct,
    /// Stage the file and offer resize options in the chat.
    ChooseSize,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Processed {
        user: UserKey,
        result: ProcessingResult,
    },
    AwaitingChoice {
        user: UserKey,
        options: Vec<ResizeOption>,
    },
}

impl UploadOutcome {
    pub fn user(&self) -> UserKey {
        match self {
            UploadOutcome::Processed { user, .. } | UploadOutcome::AwaitingChoice { user, .. } => {
                *user
            }
        }
    }
}

pub struct UploadHandler {
    tokens: TokenRegistry,
    staging: StagingStore,
    fit_options: FitOptions,
    max_upload_bytes: usize,
}

impl UploadHandler {
    pub fn new(
        tokens: TokenRegistry,
        staging: StagingStore,
        fit_options: FitOptions,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            tokens,
            staging,
            fit_options,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &AppConfig, tokens: TokenRegistry, staging: StagingStore) -> Self {
        Self::new(
            tokens,
            staging,
            config.fit_options(),
            config.upload.max_upload_bytes,
        )
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// Handle one form submission with the mozjpeg codec.
    pub fn handle(
        &self,
        token: &str,
        bytes: &[u8],
        flow: UploadFlow,
    ) -> Result<UploadOutcome, UploadError> {
        self.handle_with_codec(&MozjpegCodec::new(), token, bytes, flow)
    }

    pub fn handle_with_codec(
        &self,
        codec: &impl JpegCodec,
        token: &str,
        bytes: &[u8],
        flow: UploadFlow,
    ) -> Result<UploadOutcome, UploadError> {
        if bytes.len() > self.max_upload_bytes {
            warn!(size = bytes.len(), limit = self.max_upload_bytes, "upload rejected: too large");
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        let Some(user) = self.tokens.validate(token) else {
            warn!("upload rejected: bad or expired token");
            return Err(UploadError::Auth);
        };

        match flow {
            UploadFlow::Direct => {
                let result = fit_with_codec(codec, bytes, &self.fit_options)?;
                info!(%user, original = result.original_size, final_size = result.final_size, quality = %result.quality, "processed upload");
                Ok(UploadOutcome::Processed { user, result })
            }
            UploadFlow::ChooseSize => {
                let dimensions = get_dimensions(bytes).map_err(FitError::from)?;
                self.staging.save(user, bytes, Some(dimensions))?;
                let options = calculate_resize_options(dimensions);
                info!(%user, %dimensions, options = options.len(), "staged upload for size choice");
                Ok(UploadOutcome::AwaitingChoice { user, options })
            }
        }
    }
}
