//! Render diagnostics: timing and per-stage metrics.
//!
//! Every [`render`](crate::render) call collects diagnostics alongside
//! the output buffer. Timestamps come from the `web-time` crate, which
//! uses `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::PixelBuffer;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single render.
///
/// The resize stage only runs when a target width was requested, so it
/// is `None` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Export resize, before any effect.
    pub resize: Option<StageDiagnostics>,
    /// Tonal adjustment.
    pub tonal: StageDiagnostics,
    /// Painterly stylization.
    pub stylize: StageDiagnostics,
    /// Halftone screening.
    pub halftone: StageDiagnostics,
    /// Total wall-clock duration of the render (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the render.
    pub summary: RenderSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Export resize metrics.
    Resize {
        /// Source width in pixels.
        from_width: u32,
        /// Source height in pixels.
        from_height: u32,
        /// Resized width in pixels.
        to_width: u32,
        /// Resized height in pixels.
        to_height: u32,
        /// Resampling filter name.
        filter: String,
    },
    /// Tonal adjustment metrics.
    Tonal {
        /// Whether every tonal parameter was zero (the buffer was copied).
        identity: bool,
        /// Mean channel value before adjustment, `[0, 255]`.
        mean_before: f64,
        /// Mean channel value after adjustment, `[0, 255]`.
        mean_after: f64,
    },
    /// Stylization metrics.
    Stylize {
        /// Style name.
        style: String,
        /// Granularity used.
        granularity: u8,
        /// Randomness used.
        randomness: u8,
        /// Whether the stage was a pass-through.
        skipped: bool,
    },
    /// Halftone metrics.
    Halftone {
        /// Style name.
        style: String,
        /// Block size in pixels.
        step: u32,
        /// Fraction of output pixels with nonzero alpha.
        coverage: f64,
        /// Whether the stage was a pass-through.
        skipped: bool,
    },
}

/// High-level summary of a render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSummary {
    /// Source width in pixels.
    pub source_width: u32,
    /// Source height in pixels.
    pub source_height: u32,
    /// Output width in pixels.
    pub output_width: u32,
    /// Output height in pixels.
    pub output_height: u32,
    /// Seed the stochastic stages were derived from.
    pub seed: u64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Render Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> {}x{} (seed {})",
            self.summary.source_width,
            self.summary.source_height,
            self.summary.output_width,
            self.summary.output_height,
            self.summary.seed,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::new();
        if let Some(ref resize) = self.resize {
            stages.push(("Resize", resize));
        }
        stages.push(("Tonal", &self.tonal));
        stages.push(("Stylize", &self.stylize));
        stages.push(("Halftone", &self.halftone));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Resize {
            from_width,
            from_height,
            to_width,
            to_height,
            filter,
        } => format!("{from_width}x{from_height} -> {to_width}x{to_height} ({filter})"),
        StageMetrics::Tonal {
            identity: true, ..
        } => "identity".to_string(),
        StageMetrics::Tonal {
            mean_before,
            mean_after,
            ..
        } => format!("mean {mean_before:.1} -> {mean_after:.1}"),
        StageMetrics::Stylize { style, skipped: true, .. }
        | StageMetrics::Halftone { style, skipped: true, .. } => format!("{style} (skipped)"),
        StageMetrics::Stylize {
            style,
            granularity,
            randomness,
            ..
        } => format!("{style} g={granularity} r={randomness}"),
        StageMetrics::Halftone {
            style,
            step,
            coverage,
            ..
        } => format!("{style} step={step}px coverage={:.1}%", coverage * 100.0),
    }
}

/// Mean of the color channels across all pixels, ignoring alpha.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean_channel(buffer: &PixelBuffer) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum: u64 = buffer
        .samples()
        .chunks_exact(4)
        .map(|px| u64::from(px[0]) + u64::from(px[1]) + u64::from(px[2]))
        .sum();
    sum as f64 / (buffer.pixel_count() as f64 * 3.0)
}

/// Fraction of pixels with nonzero alpha.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn coverage(buffer: &PixelBuffer) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    let covered = buffer
        .samples()
        .chunks_exact(4)
        .filter(|px| px[3] > 0)
        .count();
    covered as f64 / buffer.pixel_count() as f64
}
