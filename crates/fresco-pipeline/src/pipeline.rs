//! Incremental render pipeline: advance stage-by-stage, inspecting each
//! intermediate buffer before continuing.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use fresco_pipeline::{FilterSettings, Pipeline, PipelineError, PixelBuffer, RenderOptions};
//! # fn run(source: Arc<PixelBuffer>) -> Result<(), PipelineError> {
//! let result = Pipeline::new(source, FilterSettings::default(), RenderOptions::default())
//!     .tone()
//!     .stylize()?
//!     .halftone()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages). Only the most recent buffer is
//! retained; the source stays behind its `Arc` and is never modified.
//!
//! Every stochastic stage draws from its own [`StdRng`] derived from
//! [`RenderOptions::seed`] and the stage index, so identical inputs
//! produce identical bytes and one stage's draws never shift another's.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::diagnostics::{PipelineDiagnostics, RenderSummary, StageDiagnostics, StageMetrics};
use crate::resize::ResizeFilter;
use crate::tonal::TonalAdjustments;
use crate::types::{ArtStyle, Dimensions, FilterSettings, PipelineError, PixelBuffer, RasterStyle};

/// Options that shape a render without being user edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Seed for every stochastic stage.
    pub seed: u64,
    /// Resize the source to this width before any effect.
    pub target_width: Option<u32>,
    /// Filter used for the resize.
    pub resize_filter: ResizeFilter,
}

impl RenderOptions {
    /// Default seed.
    pub const DEFAULT_SEED: u64 = 0x5EED;
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            seed: Self::DEFAULT_SEED,
            target_width: None,
            resize_filter: ResizeFilter::default(),
        }
    }
}

/// Output of a completed render.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// The final buffer.
    pub buffer: PixelBuffer,
    /// Timing and metrics for each stage.
    pub diagnostics: PipelineDiagnostics,
}

/// Outcome of [`render_cancellable`].
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// Every stage ran.
    Completed(RenderResult),
    /// The render was abandoned at a stage boundary.
    Cancelled {
        /// Name of the stage that would have run next.
        before: &'static str,
    },
}

/// Stage-local generator. The multiplier spreads consecutive indices
/// across the seed space.
fn stage_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Bookkeeping carried from stage to stage.
#[derive(Debug, Clone)]
struct Trail {
    settings: FilterSettings,
    options: RenderOptions,
    started: Instant,
    source: Dimensions,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`tone`](Self::tone) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .tone() to continue"]
pub struct Pending {
    source: Arc<PixelBuffer>,
    settings: FilterSettings,
    options: RenderOptions,
}

impl Pending {
    /// The untouched source buffer.
    #[must_use]
    pub fn source(&self) -> &PixelBuffer {
        &self.source
    }

    /// Resize (when a target width is set) and apply tonal adjustments.
    pub fn tone(self) -> Toned {
        let started = Instant::now();
        let trail = Trail {
            settings: self.settings.clamped(),
            options: self.options,
            started,
            source: self.source.dimensions(),
        };

        let (working, resize) = match self.options.target_width {
            Some(width) if width != self.source.width() => {
                let resized =
                    crate::resize::resize_to_width(&self.source, width, self.options.resize_filter);
                let diag = StageDiagnostics {
                    duration: started.elapsed(),
                    metrics: StageMetrics::Resize {
                        from_width: self.source.width(),
                        from_height: self.source.height(),
                        to_width: resized.width(),
                        to_height: resized.height(),
                        filter: self.options.resize_filter.to_string(),
                    },
                };
                (Some(resized), Some(diag))
            }
            _ => (None, None),
        };
        let input = working.as_ref().unwrap_or(&*self.source);

        let tonal_start = Instant::now();
        let adjustments = TonalAdjustments::from(&trail.settings);
        let buffer = crate::tonal::apply(input, &adjustments);
        let tonal = StageDiagnostics {
            duration: tonal_start.elapsed(),
            metrics: StageMetrics::Tonal {
                identity: adjustments.is_identity(),
                mean_before: crate::diagnostics::mean_channel(input),
                mean_after: crate::diagnostics::mean_channel(&buffer),
            },
        };

        Toned {
            trail,
            resize,
            tonal,
            buffer,
        }
    }
}

// ───────────────────────── Stage 1: Toned ────────────────────────────

/// Pipeline state after tonal adjustment.
///
/// Call [`stylize`](Self::stylize) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .stylize() to continue"]
pub struct Toned {
    trail: Trail,
    resize: Option<StageDiagnostics>,
    tonal: StageDiagnostics,
    buffer: PixelBuffer,
}

impl Toned {
    /// The adjusted buffer.
    #[must_use]
    pub const fn toned(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Apply the configured stylization.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SurfaceUnavailable`] if the style needs a
    /// drawing surface that cannot be allocated.
    pub fn stylize(self) -> Result<Stylized, PipelineError> {
        let start = Instant::now();
        let style = self.trail.settings.art_style;
        let params = self.trail.settings.art_params();
        let skipped = style == ArtStyle::None;
        let buffer = if skipped {
            self.buffer
        } else {
            let mut rng = stage_rng(self.trail.options.seed, <Stylized as PipelineStage>::INDEX);
            crate::stylize::apply(&self.buffer, style, params, &mut rng)?
        };
        let stylize = StageDiagnostics {
            duration: start.elapsed(),
            metrics: StageMetrics::Stylize {
                style: style.to_string(),
                granularity: params.granularity,
                randomness: params.randomness,
                skipped,
            },
        };
        Ok(Stylized {
            trail: self.trail,
            resize: self.resize,
            tonal: self.tonal,
            stylize,
            buffer,
        })
    }
}

// ───────────────────────── Stage 2: Stylized ─────────────────────────

/// Pipeline state after stylization.
///
/// Call [`halftone`](Self::halftone) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .halftone() to continue"]
pub struct Stylized {
    trail: Trail,
    resize: Option<StageDiagnostics>,
    tonal: StageDiagnostics,
    stylize: StageDiagnostics,
    buffer: PixelBuffer,
}

impl Stylized {
    /// The stylized buffer.
    #[must_use]
    pub const fn stylized(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Apply the configured halftone.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SurfaceUnavailable`] if the drawing
    /// surface cannot be allocated.
    pub fn halftone(self) -> Result<Halftoned, PipelineError> {
        let start = Instant::now();
        let style = self.trail.settings.raster_style;
        let params = self.trail.settings.raster_params();
        let skipped = style == RasterStyle::None;
        let buffer = if skipped {
            self.buffer
        } else {
            let mut rng = stage_rng(self.trail.options.seed, <Halftoned as PipelineStage>::INDEX);
            crate::halftone::apply(&self.buffer, style, params, &mut rng)?
        };
        let halftone = StageDiagnostics {
            duration: start.elapsed(),
            metrics: StageMetrics::Halftone {
                style: style.to_string(),
                step: crate::halftone::step_size(params.granularity()),
                coverage: crate::diagnostics::coverage(&buffer),
                skipped,
            },
        };
        Ok(Halftoned {
            trail: self.trail,
            resize: self.resize,
            tonal: self.tonal,
            stylize: self.stylize,
            halftone,
            buffer,
        })
    }
}

// ───────────────────────── Stage 3: Halftoned ────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to take the output.
#[must_use = "call .into_result() to take the rendered buffer"]
pub struct Halftoned {
    trail: Trail,
    resize: Option<StageDiagnostics>,
    tonal: StageDiagnostics,
    stylize: StageDiagnostics,
    halftone: StageDiagnostics,
    buffer: PixelBuffer,
}

impl Halftoned {
    /// The final buffer.
    #[must_use]
    pub const fn halftoned(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Consume the pipeline and return the buffer with its diagnostics.
    #[must_use]
    pub fn into_result(self) -> RenderResult {
        let summary = RenderSummary {
            source_width: self.trail.source.width,
            source_height: self.trail.source.height,
            output_width: self.buffer.width(),
            output_height: self.buffer.height(),
            seed: self.trail.options.seed,
        };
        RenderResult {
            diagnostics: PipelineDiagnostics {
                resize: self.resize,
                tonal: self.tonal,
                stylize: self.stylize,
                halftone: self.halftone,
                total_duration: self.trail.started.elapsed(),
                summary,
            },
            buffer: self.buffer,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 4;

/// Stage names, indexed by [`PipelineStage::INDEX`].
pub const STAGE_NAMES: [&str; STAGE_COUNT] = [
    <Pending as PipelineStage>::NAME,
    <Toned as PipelineStage>::NAME,
    <Stylized as PipelineStage>::NAME,
    <Halftoned as PipelineStage>::NAME,
];

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"tonal"`).
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// The buffer this stage produced (the source for [`Pending`]).
    fn output(&self) -> &PixelBuffer;

    /// Metrics describing the work done to reach this state. `None` for
    /// [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the stage transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the [`RenderResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    fn complete(self) -> Result<RenderResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> &PixelBuffer {
        &self.source
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Toned(self.tone())))
    }

    fn complete(self) -> Result<RenderResult, PipelineError> {
        self.tone().complete()
    }
}

impl PipelineStage for Toned {
    const NAME: &str = "tonal";
    const INDEX: usize = 1;

    fn output(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.tonal.metrics.clone())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Stylized(self.stylize()?)))
    }

    fn complete(self) -> Result<RenderResult, PipelineError> {
        self.stylize()?.complete()
    }
}

impl PipelineStage for Stylized {
    const NAME: &str = "stylize";
    const INDEX: usize = 2;

    fn output(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stylize.metrics.clone())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Halftoned(self.halftone()?)))
    }

    fn complete(self) -> Result<RenderResult, PipelineError> {
        self.halftone()?.complete()
    }
}

impl PipelineStage for Halftoned {
    const NAME: &str = "halftone";
    const INDEX: usize = 3;

    fn output(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.halftone.metrics.clone())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<RenderResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Toned`].
    Toned(Toned),
    /// See [`Stylized`].
    Stylized(Stylized),
    /// See [`Halftoned`].
    Halftoned(Halftoned),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails, a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_) | Stage::Toned(_) | Stage::Stylized(_) | Stage::Halftoned(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Toned(s) => s.$method($($arg),*),
            Self::Stylized(s) => s.$method($($arg),*),
            Self::Halftoned(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The buffer this stage produced.
    #[must_use]
    pub fn output(&self) -> &PixelBuffer {
        delegate!(self, output)
    }

    /// Stage-specific metrics. `None` for `Pending`.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Halftoned(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    pub fn complete(self) -> Result<RenderResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; associated
// constants aren't reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Toned> for Stage {
    fn from(s: Toned) -> Self {
        Self::Toned(s)
    }
}

impl From<Stylized> for Stage {
    fn from(s: Stylized) -> Self {
        Self::Stylized(s)
    }
}

impl From<Halftoned> for Stage {
    fn from(s: Halftoned) -> Self {
        Self::Halftoned(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental render pipeline.
///
/// Created via [`Pipeline::new`], which stores the source, settings and
/// options without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error to
/// skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline. No processing is performed.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(
        source: Arc<PixelBuffer>,
        settings: FilterSettings,
        options: RenderOptions,
    ) -> Pending {
        Pending {
            source,
            settings,
            options,
        }
    }
}

/// Run every stage.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] when a stage that draws
/// cannot allocate its surface (e.g. an empty source with a non-`None`
/// style).
pub fn render(
    source: Arc<PixelBuffer>,
    settings: FilterSettings,
    options: RenderOptions,
) -> Result<RenderResult, PipelineError> {
    Pipeline::new(source, settings, options).complete()
}

/// Run every stage, checking `is_stale` before each one.
///
/// A stage that has started always finishes; cancellation only happens
/// at stage boundaries.
///
/// # Errors
///
/// Returns [`PipelineError`] if a stage fails before the render is
/// cancelled.
pub fn render_cancellable(
    source: Arc<PixelBuffer>,
    settings: FilterSettings,
    options: RenderOptions,
    is_stale: impl Fn() -> bool,
) -> Result<RenderOutcome, PipelineError> {
    let mut stage: Stage = Pipeline::new(source, settings, options).into();
    while !stage.is_complete() {
        if is_stale() {
            let before = STAGE_NAMES
                .get(stage.index() + 1)
                .copied()
                .unwrap_or(<Halftoned as PipelineStage>::NAME);
            tracing::debug!(before, "render superseded");
            return Ok(RenderOutcome::Cancelled { before });
        }
        stage = match stage.advance()? {
            Advance::Next(next) | Advance::Complete(next) => next,
        };
    }
    stage.complete().map(RenderOutcome::Completed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::resize::ExportSize;

    fn gradient(width: u32, height: u32) -> Arc<PixelBuffer> {
        let mut samples = Vec::new();
        for y in 0..height {
            for x in 0..width {
                #[allow(clippy::cast_possible_truncation)]
                samples.extend_from_slice(&[
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    128,
                    255,
                ]);
            }
        }
        Arc::new(PixelBuffer::new(width, height, samples).unwrap())
    }

    fn styled() -> FilterSettings {
        FilterSettings {
            brightness: 20,
            art_style: ArtStyle::Stipple,
            raster_style: RasterStyle::Dots,
            ..FilterSettings::default()
        }
    }

    // ─────────── Typed API tests ─────────────────────────────────

    #[test]
    fn pending_exposes_source() {
        let source = gradient(8, 6);
        let pending = Pipeline::new(Arc::clone(&source), styled(), RenderOptions::default());
        assert_eq!(pending.source(), &*source);
    }

    #[test]
    fn default_settings_are_identity() {
        let source = gradient(16, 9);
        let result = render(
            Arc::clone(&source),
            FilterSettings::default(),
            RenderOptions::default(),
        )
        .unwrap();
        assert_eq!(&result.buffer, &*source);
    }

    #[test]
    fn toned_applies_brightness() {
        let source = Arc::new(PixelBuffer::filled(4, 4, [100, 100, 100, 255]));
        let settings = FilterSettings {
            brightness: 50,
            ..FilterSettings::default()
        };
        let toned = Pipeline::new(source, settings, RenderOptions::default()).tone();
        assert_eq!(toned.toned().pixel(0, 0), Some([150, 150, 150, 255]));
    }

    #[test]
    fn stages_chain_to_a_result() {
        let result = Pipeline::new(gradient(24, 24), styled(), RenderOptions::default())
            .tone()
            .stylize()
            .unwrap()
            .halftone()
            .unwrap()
            .into_result();
        assert_eq!(result.buffer.dimensions(), Dimensions { width: 24, height: 24 });
        assert!(matches!(
            result.diagnostics.stylize.metrics,
            StageMetrics::Stylize { skipped: false, .. }
        ));
        assert!(result.diagnostics.resize.is_none());
    }

    #[test]
    fn source_is_never_mutated() {
        let source = gradient(20, 20);
        let before = (*source).clone();
        render(Arc::clone(&source), styled(), RenderOptions::default()).unwrap();
        assert_eq!(*source, before);
    }

    #[test]
    fn same_seed_same_bytes() {
        let source = gradient(30, 20);
        let a = render(Arc::clone(&source), styled(), RenderOptions::default()).unwrap();
        let b = render(Arc::clone(&source), styled(), RenderOptions::default()).unwrap();
        assert_eq!(a.buffer, b.buffer);
    }

    #[test]
    fn different_seed_changes_stochastic_output() {
        let source = gradient(40, 40);
        let a = render(Arc::clone(&source), styled(), RenderOptions::default()).unwrap();
        let options = RenderOptions {
            seed: 99,
            ..RenderOptions::default()
        };
        let b = render(source, styled(), options).unwrap();
        assert_ne!(a.buffer, b.buffer);
    }

    #[test]
    fn target_width_resizes_first() {
        let options = RenderOptions {
            target_width: ExportSize::Custom(20).target_width(),
            ..RenderOptions::default()
        };
        let result = render(gradient(40, 30), styled(), options).unwrap();
        assert_eq!((result.buffer.width(), result.buffer.height()), (20, 15));
        assert!(result.diagnostics.resize.is_some());
        assert_eq!(result.diagnostics.summary.source_width, 40);
        assert_eq!(result.diagnostics.summary.output_width, 20);
    }

    #[test]
    fn empty_source_with_style_fails() {
        let source = Arc::new(PixelBuffer::filled(0, 0, [0; 4]));
        let result = render(source, styled(), RenderOptions::default());
        assert!(matches!(
            result,
            Err(PipelineError::SurfaceUnavailable { .. })
        ));
    }

    #[test]
    fn empty_source_without_style_passes_through() {
        let source = Arc::new(PixelBuffer::filled(0, 0, [0; 4]));
        let result = render(source, FilterSettings::default(), RenderOptions::default()).unwrap();
        assert!(result.buffer.is_empty());
    }

    // ─────────── Dynamic API tests ───────────────────────────────

    #[test]
    fn stage_loop_visits_every_stage() {
        let mut stage: Stage =
            Pipeline::new(gradient(12, 12), styled(), RenderOptions::default()).into();
        let mut visited = vec![stage.name()];
        loop {
            match stage.advance().unwrap() {
                Advance::Next(next) => {
                    assert!(next.metrics().is_some());
                    visited.push(next.name());
                    stage = next;
                }
                Advance::Complete(_) => break,
            }
        }
        assert_eq!(visited, STAGE_NAMES);
    }

    #[test]
    fn stage_indices_match_names() {
        for (i, name) in STAGE_NAMES.iter().enumerate() {
            assert!(!name.is_empty(), "stage {i}");
        }
        let stage: Stage = Pipeline::new(gradient(4, 4), styled(), RenderOptions::default())
            .tone()
            .into();
        assert_eq!(stage.index(), 1);
        assert_eq!(stage.name(), STAGE_NAMES[1]);
    }

    // ─────────── Cancellation ────────────────────────────────────

    #[test]
    fn never_stale_completes() {
        let outcome = render_cancellable(
            gradient(10, 10),
            styled(),
            RenderOptions::default(),
            || false,
        )
        .unwrap();
        assert!(matches!(outcome, RenderOutcome::Completed(_)));
    }

    #[test]
    fn stale_after_tonal_cancels_before_stylize() {
        let checks = Cell::new(0);
        let outcome = render_cancellable(
            gradient(10, 10),
            styled(),
            RenderOptions::default(),
            || {
                checks.set(checks.get() + 1);
                checks.get() > 1
            },
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RenderOutcome::Cancelled { before: "stylize" }
        ));
    }

    #[test]
    fn stale_from_the_start_does_nothing() {
        let outcome = render_cancellable(
            gradient(10, 10),
            styled(),
            RenderOptions::default(),
            || true,
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RenderOutcome::Cancelled { before: "tonal" }
        ));
    }

    #[test]
    fn render_options_deserialize_with_defaults() {
        let options: RenderOptions = serde_json::from_str(r#"{"target_width":800}"#).unwrap();
        assert_eq!(options.seed, RenderOptions::DEFAULT_SEED);
        assert_eq!(options.target_width, Some(800));
    }
}
