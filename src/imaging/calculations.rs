//! Pure calculation functions for resize targets.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Dimensions;

/// Width used for images that occupy part of a screen.
pub const PART_SCREEN_WIDTH: u32 = 640;
/// Width used for full-width images.
pub const FULL_WIDTH: u32 = 1280;
/// Width of the high-DPI full-width variant.
pub const FULL_WIDTH_HIGH_DPI: u32 = 2560;

/// What a resize option is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeKind {
    Original,
    PartScreen,
    PartScreenHighDpi,
    FullWidth,
    FullWidthHighDpi,
}

impl ResizeKind {
    /// Marker shown next to the option on a chat keyboard.
    pub fn marker(self) -> &'static str {
        match self {
            ResizeKind::Original => "😴",
            ResizeKind::PartScreen => "🥑",
            ResizeKind::PartScreenHighDpi => "2️⃣🥑",
            ResizeKind::FullWidth => "🍑",
            ResizeKind::FullWidthHighDpi => "2️⃣🍑",
        }
    }

    fn describe(self, dims: Dimensions) -> String {
        match self {
            ResizeKind::Original => format!("Original size {dims}"),
            ResizeKind::PartScreen => format!("Part of the screen {dims}"),
            ResizeKind::PartScreenHighDpi => format!("Part of a high-DPI screen {dims}"),
            ResizeKind::FullWidth => format!("Full width {dims}"),
            ResizeKind::FullWidthHighDpi => format!("Full width, high-DPI {dims}"),
        }
    }
}

/// A candidate target resolution derived from the source dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOption {
    pub width: u32,
    pub height: u32,
    pub label: String,
    pub kind: ResizeKind,
}

impl ResizeOption {
    fn new(kind: ResizeKind, dims: Dimensions) -> Self {
        Self {
            width: dims.width,
            height: dims.height,
            label: kind.describe(dims),
            kind,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Scale `source` to `target_width`, keeping the aspect ratio.
///
/// The height is truncated, never rounded up, and never drops below 1.
///
/// # Examples
/// ```
/// # use jpeg_fit::imaging::{Dimensions, scale_to_width};
/// assert_eq!(scale_to_width(Dimensions::new(5000, 3750), 640), Dimensions::new(640, 480));
/// assert_eq!(scale_to_width(Dimensions::new(1000, 333), 640), Dimensions::new(640, 213));
/// ```
pub fn scale_to_width(source: Dimensions, target_width: u32) -> Dimensions {
    let height = source.height as u64 * target_width as u64 / source.width.max(1) as u64;
    Dimensions::new(target_width, (height as u32).max(1))
}

/// Calculate the resize options offered for an image.
///
/// The original size is always first. Narrower targets are only offered when
/// the source is wider than them, and the high-DPI variants only when the
/// source is wider than the high-DPI width's base.
///
/// ```text
/// width > 640   → 640 (part screen)
/// width > 1280  → 1280 (part screen, high-DPI) + 1280 (full width)
/// width > 2560  → 2560 (full width, high-DPI)
/// ```
pub fn calculate_resize_options(source: Dimensions) -> Vec<ResizeOption> {
    let mut options = vec![ResizeOption::new(ResizeKind::Original, source)];

    if source.width > PART_SCREEN_WIDTH {
        options.push(ResizeOption::new(
            ResizeKind::PartScreen,
            scale_to_width(source, PART_SCREEN_WIDTH),
        ));
        if source.width > FULL_WIDTH {
            options.push(ResizeOption::new(
                ResizeKind::PartScreenHighDpi,
                scale_to_width(source, FULL_WIDTH),
            ));
        }
    }

    if source.width > FULL_WIDTH {
        options.push(ResizeOption::new(
            ResizeKind::FullWidth,
            scale_to_width(source, FULL_WIDTH),
        ));
        if source.width > FULL_WIDTH_HIGH_DPI {
            options.push(ResizeOption::new(
                ResizeKind::FullWidthHighDpi,
                scale_to_width(source, FULL_WIDTH_HIGH_DPI),
            ));
        }
    }

    options
}
