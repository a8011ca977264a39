//! User-facing text for fit results, resize choices and tokens.
//!
//! # Output Format
//!
//! ## Fit
//!
//! ```text
//! photo.png → photo.jpg
//!     Original: 5.1 MB
//!     Final: 398.2 KB (limit 400.0 KB)
//!     Quality: 80
//! ```
//!
//! When the input already fits it is passed through and the quality line
//! reads `unchanged`.
//!
//! ## Options
//!
//! ```text
//! 5000x3750
//! 1 😴 Original size 5000x3750
//! 2 🥑 Part of the screen 640x480
//! 3 2️⃣🥑 Part of a high-DPI screen 1280x960
//! ```
//!
//! ## Caption
//!
//! The chat caption is a single short message, see [`format_caption`].
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `String` or `Vec<String>`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::fit::ProcessingResult;
use crate::imaging::{Dimensions, ResizeOption};
use crate::types::UserKey;
use std::path::Path;
use std::time::Duration;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count using binary units.
///
/// ```text
/// 512       → 512 B
/// 409600    → 400.0 KB
/// 5347737   → 5.1 MB
/// ```
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn quality_text(result: &ProcessingResult) -> String {
    if result.was_reencoded() {
        result.quality.to_string()
    } else {
        "unchanged".to_string()
    }
}

/// Caption sent along with the processed file.
pub fn format_caption(result: &ProcessingResult) -> String {
    if !result.was_reencoded() {
        return format!(
            "Here is your image! It already fit ({}), so it is unchanged.",
            format_size(result.final_size)
        );
    }
    format!(
        "Here is your processed image! {} → {}, quality {}.",
        format_size(result.original_size),
        format_size(result.final_size),
        result.quality
    )
}

/// CLI report for one `fit` run.
pub fn format_fit_result(
    input: &Path,
    output: &Path,
    result: &ProcessingResult,
    max_size_bytes: usize,
) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", input.display(), output.display())];
    lines.push(format!(
        "{}Original: {}",
        indent(1),
        format_size(result.original_size)
    ));
    lines.push(format!(
        "{}Final: {} (limit {})",
        indent(1),
        format_size(result.final_size),
        format_size(max_size_bytes)
    ));
    lines.push(format!("{}Quality: {}", indent(1), quality_text(result)));
    if result.final_size > max_size_bytes {
        lines.push(format!(
            "{}Warning: lowest quality still exceeds the limit",
            indent(1)
        ));
    }
    lines
}

pub fn print_fit_result(input: &Path, output: &Path, result: &ProcessingResult, max_size_bytes: usize) {
    for line in format_fit_result(input, output, result, max_size_bytes) {
        println!("{line}");
    }
}

/// Numbered resize choices, one per line, under the source dimensions.
pub fn format_resize_options(source: Dimensions, options: &[ResizeOption]) -> Vec<String> {
    let mut lines = vec![source.to_string()];
    for (i, option) in options.iter().enumerate() {
        lines.push(format!("{} {} {}", i + 1, option.kind.marker(), option.label));
    }
    lines
}

pub fn print_resize_options(source: Dimensions, options: &[ResizeOption]) {
    for line in format_resize_options(source, options) {
        println!("{line}");
    }
}

/// Token plus how long it stays valid.
pub fn format_token(user: UserKey, token: &str, remaining: Duration) -> Vec<String> {
    let secs = remaining.as_secs();
    vec![
        token.to_string(),
        format!(
            "{}user {user}, valid for {}m {:02}s",
            indent(1),
            secs / 60,
            secs % 60
        ),
    ]
}

pub fn print_token(user: UserKey, token: &str, remaining: Duration) {
    for line in format_token(user, token, remaining) {
        println!("{line}");
    }
}
