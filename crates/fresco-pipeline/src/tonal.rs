//! Tonal adjustment: brightness, contrast, saturation, then shadow and
//! highlight multipliers.
//!
//! The first three follow the CSS `brightness() contrast() saturate()`
//! filter chain, evaluated per channel in normalized space with
//! clamping after each filter. Shadows and highlights then scale whole
//! pixels by their mean luminance band. Alpha is never touched.

use serde::{Deserialize, Serialize};

use crate::types::{FilterSettings, PixelBuffer};

/// Pixels with mean channel value below this are shadows.
pub const SHADOW_LIMIT: f32 = 80.0;

/// Pixels with mean channel value above this are highlights.
pub const HIGHLIGHT_LIMIT: f32 = 180.0;

/// The five tonal parameters, each in `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TonalAdjustments {
    /// Brightness offset.
    pub brightness: i8,
    /// Contrast offset.
    pub contrast: i8,
    /// Saturation offset.
    pub saturation: i8,
    /// Highlight multiplier offset.
    pub highlights: i8,
    /// Shadow multiplier offset.
    pub shadows: i8,
}

impl TonalAdjustments {
    /// Whether every parameter is zero.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.brightness == 0
            && self.contrast == 0
            && self.saturation == 0
            && self.highlights == 0
            && self.shadows == 0
    }
}

impl From<&FilterSettings> for TonalAdjustments {
    fn from(settings: &FilterSettings) -> Self {
        Self {
            brightness: settings.brightness,
            contrast: settings.contrast,
            saturation: settings.saturation,
            highlights: settings.highlights,
            shadows: settings.shadows,
        }
    }
}

/// Apply tonal adjustments, returning a new buffer.
///
/// Total for any input. All-zero adjustments return a byte-identical
/// copy; out-of-range parameters are clamped to `[-100, 100]`.
#[must_use = "returns the adjusted buffer"]
pub fn apply(buffer: &PixelBuffer, adjustments: &TonalAdjustments) -> PixelBuffer {
    if adjustments.is_identity() {
        return buffer.clone();
    }

    let factor = |v: i8| 1.0 + f32::from(v.clamp(-100, 100)) / 100.0;
    let brightness = factor(adjustments.brightness);
    let contrast = factor(adjustments.contrast);
    let matrix = saturation_matrix(factor(adjustments.saturation));
    let shadow_gain = 1.0 + f32::from(adjustments.shadows.clamp(-100, 100)) / 200.0;
    let highlight_gain = 1.0 + f32::from(adjustments.highlights.clamp(-100, 100)) / 200.0;

    let mut samples = buffer.samples().to_vec();
    for px in samples.chunks_exact_mut(4) {
        let mut rgb = [px[0], px[1], px[2]].map(|c| f32::from(c) / 255.0);

        for c in &mut rgb {
            *c = (*c * brightness).clamp(0.0, 1.0);
        }
        for c in &mut rgb {
            *c = (*c - 0.5).mul_add(contrast, 0.5).clamp(0.0, 1.0);
        }
        let [r, g, b] = rgb;
        for (c, row) in rgb.iter_mut().zip(&matrix) {
            *c = row[0]
                .mul_add(r, row[1].mul_add(g, row[2] * b))
                .clamp(0.0, 1.0);
        }

        let mut out = rgb.map(|c| c * 255.0);
        let luminance = (out[0] + out[1] + out[2]) / 3.0;
        let gain = if luminance < SHADOW_LIMIT {
            shadow_gain
        } else if luminance > HIGHLIGHT_LIMIT {
            highlight_gain
        } else {
            1.0
        };
        for c in &mut out {
            *c *= gain;
        }

        px[0] = to_channel(out[0]);
        px[1] = to_channel(out[1]);
        px[2] = to_channel(out[2]);
    }

    PixelBuffer::new(buffer.width(), buffer.height(), samples).unwrap_or_else(|_| buffer.clone())
}

/// The luminance-preserving saturate matrix used by CSS `saturate()`.
fn saturation_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [
            0.787f32.mul_add(s, 0.213),
            0.715f32.mul_add(-s, 0.715),
            0.072f32.mul_add(-s, 0.072),
        ],
        [
            0.213f32.mul_add(-s, 0.213),
            0.285f32.mul_add(s, 0.715),
            0.072f32.mul_add(-s, 0.072),
        ],
        [
            0.213f32.mul_add(-s, 0.213),
            0.715f32.mul_add(-s, 0.715),
            0.928f32.mul_add(s, 0.072),
        ],
    ]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
