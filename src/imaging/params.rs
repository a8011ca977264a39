//! Parameter types for encoding and resizing.
//!
//! These structs describe *what* to encode, not *how*. The engine in
//! [`fit`](crate::fit) decides which qualities to try; the
//! [`codec`](super::codec) does the actual compression.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100). Clamped on construction.
//! - [`QualityLadder`]: The descending set of qualities probed when the fast
//!   path and the resize shortcut both miss.
//! - [`Dimensions`]: Width and height in pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    /// Top of the scale. Also reported for unmodified pass-through results.
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered set of qualities to probe, highest first.
///
/// Values are clamped into 1–100, sorted descending and deduplicated, so the
/// selection step never sees two candidates with the same quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLadder(Vec<Quality>);

/// Default ladder: coarse steps down to a very aggressive floor of 5.
pub const DEFAULT_LADDER: [u32; 6] = [95, 80, 60, 40, 20, 5];

impl QualityLadder {
    /// Build a ladder from raw values. Returns `None` for an empty input.
    pub fn new(values: &[u32]) -> Option<Self> {
        let mut steps: Vec<Quality> = values.iter().map(|&v| Quality::new(v)).collect();
        steps.sort_unstable_by(|a, b| b.cmp(a));
        steps.dedup();
        if steps.is_empty() {
            None
        } else {
            Some(Self(steps))
        }
    }

    pub fn steps(&self) -> &[Quality] {
        &self.0
    }

}

impl Default for QualityLadder {
    fn default() -> Self {
        Self(DEFAULT_LADDER.iter().map(|&v| Quality::new(v)).collect())
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both edges non-zero.
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
