//! Resizing to an export width.
//!
//! Exports are sized by width only; the height follows the source aspect
//! ratio. When a render requests a target width the source is resized
//! before any other stage, so stylization densities are computed at the
//! output resolution.

use std::fmt;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::types::PixelBuffer;

/// Resampling filter used when resizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// All filters, fastest first.
    pub const ALL: [Self; 5] = [
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Export size presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportSize {
    /// Keep the source width.
    #[default]
    Original,
    /// 1920 px wide.
    Large,
    /// 1280 px wide.
    Medium,
    /// 800 px wide.
    Small,
    /// An explicit width in pixels.
    Custom(u32),
}

impl ExportSize {
    /// Target width, or `None` to keep the source width.
    #[must_use]
    pub const fn target_width(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Large => Some(1920),
            Self::Medium => Some(1280),
            Self::Small => Some(800),
            Self::Custom(width) => Some(width),
        }
    }
}

impl fmt::Display for ExportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("original"),
            Self::Large => f.write_str("large (1920px)"),
            Self::Medium => f.write_str("medium (1280px)"),
            Self::Small => f.write_str("small (800px)"),
            Self::Custom(width) => write!(f, "custom ({width}px)"),
        }
    }
}

/// Height that keeps the aspect ratio of a `width`×`height` source at
/// `target_width`. Never less than 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let scaled = f64::from(height) * f64::from(target_width) / f64::from(width);
    (scaled.round() as u32).max(1)
}

/// Resize `buffer` to `target_width` pixels wide, preserving aspect
/// ratio.
///
/// Returns an unchanged copy when the width already matches, when the
/// target is 0, or when the buffer is empty.
#[must_use]
pub fn resize_to_width(buffer: &PixelBuffer, target_width: u32, filter: ResizeFilter) -> PixelBuffer {
    if target_width == 0 || buffer.is_empty() || buffer.width() == target_width {
        return buffer.clone();
    }
    let target_height = scaled_height(buffer.width(), buffer.height(), target_width);
    let image = buffer.clone().into_rgba_image();
    let resized = image::imageops::resize(
        &image,
        target_width,
        target_height,
        filter.to_image_filter(),
    );
    tracing::debug!(
        from_width = buffer.width(),
        from_height = buffer.height(),
        target_width,
        target_height,
        %filter,
        "resized"
    );
    PixelBuffer::from_rgba_image(resized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_triangle() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::Triangle);
    }

    #[test]
    fn presets_map_to_widths() {
        assert_eq!(ExportSize::Original.target_width(), None);
        assert_eq!(ExportSize::Large.target_width(), Some(1920));
        assert_eq!(ExportSize::Medium.target_width(), Some(1280));
        assert_eq!(ExportSize::Small.target_width(), Some(800));
        assert_eq!(ExportSize::Custom(333).target_width(), Some(333));
    }

    #[test]
    fn scaled_height_rounds_and_floors_at_one() {
        assert_eq!(scaled_height(1024, 768, 256), 192);
        assert_eq!(scaled_height(1000, 333, 100), 33);
        assert_eq!(scaled_height(1000, 335, 100), 34);
        assert_eq!(scaled_height(4000, 1, 10), 1);
    }

    #[test]
    fn downscale_landscape() {
        let buf = PixelBuffer::filled(1024, 768, [128, 128, 128, 255]);
        let out = resize_to_width(&buf, 256, ResizeFilter::Triangle);
        assert_eq!((out.width(), out.height()), (256, 192));
        assert_eq!(out.pixel(100, 100), Some([128, 128, 128, 255]));
    }

    #[test]
    fn upscale_portrait() {
        let buf = PixelBuffer::filled(50, 100, [10, 20, 30, 255]);
        let out = resize_to_width(&buf, 200, ResizeFilter::Nearest);
        assert_eq!((out.width(), out.height()), (200, 400));
    }

    #[test]
    fn same_width_is_unchanged() {
        let buf = PixelBuffer::filled(64, 32, [1, 2, 3, 4]);
        assert_eq!(resize_to_width(&buf, 64, ResizeFilter::Lanczos3), buf);
    }

    #[test]
    fn every_filter_produces_target_size() {
        let buf = PixelBuffer::filled(40, 30, [200, 100, 50, 255]);
        for filter in ResizeFilter::ALL {
            let out = resize_to_width(&buf, 20, filter);
            assert_eq!((out.width(), out.height()), (20, 15), "{filter}");
        }
    }

    #[test]
    fn export_size_serde_names() {
        assert_eq!(serde_json::to_string(&ExportSize::Medium).unwrap(), "\"medium\"");
        let custom: ExportSize = serde_json::from_str(r#"{"custom":640}"#).unwrap();
        assert_eq!(custom, ExportSize::Custom(640));
    }
}
