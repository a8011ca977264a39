//! Application configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user `config.toml` overrides any subset of keys; a handful
//! of environment variables override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [fit]
//! max_size_bytes = 409600           # Output budget (400 KiB)
//! ladder = [95, 80, 60, 40, 20, 5]  # Qualities probed, highest first
//!
//! [upload]
//! max_upload_bytes = 52428800       # Upload form limit (50 MiB)
//!
//! [tokens]
//! # secret = "..."                  # HMAC key; unset = ephemeral per process
//! ttl_secs = 3600                   # Upload link validity
//!
//! [staging]
//! dir = "staging"                   # Pending images awaiting a size choice
//! max_age_secs = 3600               # Swept after this long
//!
//! [fetch]
//! timeout_secs = 30                 # URL download timeout
//! max_bytes = 52428800              # URL download limit
//!
//! [access]
//! allowed_users = []                # Chat user ids; empty = nobody
//!
//! [processing]
//! max_processes = 4                 # Max parallel encoders (omit for auto = CPU cores)
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Key |
//! |---|---|
//! | `MAX_PROCESSED_FILE_SIZE` | `fit.max_size_bytes` |
//! | `MAX_UPLOAD_SIZE` | `upload.max_upload_bytes` |
//! | `TOKEN_SECRET_KEY` | `tokens.secret` |
//! | `ALLOWED_USERS` | `access.allowed_users` (comma-separated) |
//!
//! Unknown keys are rejected to catch typos early.

use crate::fit::{DEFAULT_MAX_SIZE_BYTES, FitOptions};
use crate::imaging::{DEFAULT_LADDER, QualityLadder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Application configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Output budget and quality ladder.
    pub fit: FitConfig,
    /// Upload form limits.
    pub upload: UploadConfig,
    /// Upload link tokens.
    pub tokens: TokensConfig,
    /// Pending-image storage for the size-choice flow.
    pub staging: StagingConfig,
    /// URL download settings.
    pub fetch: FetchConfig,
    /// Chat user allow-list.
    pub access: AccessConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fit.max_size_bytes == 0 {
            return Err(ConfigError::Validation(
                "fit.max_size_bytes must be positive".into(),
            ));
        }
        if self.fit.ladder.is_empty() {
            return Err(ConfigError::Validation("fit.ladder must not be empty".into()));
        }
        if let Some(q) = self.fit.ladder.iter().find(|q| !(1..=100).contains(*q)) {
            return Err(ConfigError::Validation(format!(
                "fit.ladder values must be 1-100, got {q}"
            )));
        }
        if self.upload.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "upload.max_upload_bytes must be positive".into(),
            ));
        }
        if self.tokens.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "tokens.ttl_secs must be positive".into(),
            ));
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Engine options for a no-resize call.
    pub fn fit_options(&self) -> FitOptions {
        let ladder = QualityLadder::new(&self.fit.ladder).unwrap_or_default();
        FitOptions::new(self.fit.max_size_bytes).with_ladder(ladder)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Takes a lookup function instead of reading `std::env` directly so tests
    /// don't have to mutate process state.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("MAX_PROCESSED_FILE_SIZE") {
            self.fit.max_size_bytes = parse_env("MAX_PROCESSED_FILE_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_UPLOAD_SIZE") {
            self.upload.max_upload_bytes = parse_env("MAX_UPLOAD_SIZE", &v)?;
        }
        if let Some(v) = lookup("TOKEN_SECRET_KEY") {
            self.tokens.secret = Some(v);
        }
        if let Some(v) = lookup("ALLOWED_USERS") {
            self.access.allowed_users = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env("ALLOWED_USERS", s))
                .collect::<Result<Vec<i64>, ConfigError>>()?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{name}: cannot parse {value:?}")))
}

/// Output budget and quality ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Maximum size of a processed image in bytes.
    pub max_size_bytes: usize,
    /// JPEG qualities probed when the input does not already fit.
    pub ladder: Vec<u32>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            ladder: DEFAULT_LADDER.to_vec(),
        }
    }
}

/// Upload form limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Uploads larger than this are rejected before any processing.
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Upload link tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokensConfig {
    /// Signing key. When absent, a random key is generated at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// How long an issued upload link stays valid.
    pub ttl_secs: u64,
}

impl TokensConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_secs: 3600,
        }
    }
}

/// Pending-image storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    /// Root directory; one subdirectory per user.
    pub dir: PathBuf,
    /// Entries older than this are removed by `sweep`.
    pub max_age_secs: u64,
}

impl StagingConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("staging"),
            max_age_secs: 3600,
        }
    }
}

/// URL download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Whole-request timeout.
    pub timeout_secs: u64,
    /// Bodies larger than this are rejected.
    pub max_bytes: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Chat user allow-list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// User ids allowed to use the bot. Empty allows everybody.
    pub allowed_users: Vec<i64>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encoder workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file
/// does not exist.
///
/// Environment overrides are *not* applied here; see
/// [`AppConfig::apply_env_overrides`].
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(overlay)
}

/// Load config from `path` and apply process environment overrides.
pub fn load_config_with_env(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = load_config(path)?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# jpeg-fit Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Environment variables MAX_PROCESSED_FILE_SIZE, MAX_UPLOAD_SIZE,
# TOKEN_SECRET_KEY and ALLOWED_USERS override the values below.

# ---------------------------------------------------------------------------
# Size fitting
# ---------------------------------------------------------------------------
[fit]
# Processed images are re-encoded until they are at most this many bytes.
# Inputs already under the limit are returned untouched.
max_size_bytes = 409600

# JPEG qualities tried (in parallel) when re-encoding is needed.
# The highest one that fits wins; if none fit, the lowest is used anyway.
ladder = [95, 80, 60, 40, 20, 5]

# ---------------------------------------------------------------------------
# Upload form
# ---------------------------------------------------------------------------
[upload]
# Larger uploads are rejected with a client error.
max_upload_bytes = 52428800

# ---------------------------------------------------------------------------
# Upload link tokens
# ---------------------------------------------------------------------------
[tokens]
# Signing key for upload links. Leave unset to generate a random key at
# startup (links then stop working when the process restarts).
# secret = "change-me"

# Seconds an upload link stays valid.
ttl_secs = 3600

# ---------------------------------------------------------------------------
# Staging (images waiting for the user to pick a size)
# ---------------------------------------------------------------------------
[staging]
dir = "staging"
# Entries older than this are removed by `jpeg-fit sweep`.
max_age_secs = 3600

# ---------------------------------------------------------------------------
# Downloading images by URL
# ---------------------------------------------------------------------------
[fetch]
timeout_secs = 30
max_bytes = 52428800

# ---------------------------------------------------------------------------
# Access
# ---------------------------------------------------------------------------
[access]
# Chat user ids allowed to use the bot. Empty denies everyone.
allowed_users = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encoder workers. Omit for auto (= number of CPU cores).
# max_processes = 4
"##
}
