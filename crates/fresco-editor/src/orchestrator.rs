//! Debounced, cancellable recompute of the displayed image.
//!
//! The orchestrator owns the last-loaded source and the buffer currently
//! on screen. Filter changes are coalesced over a quiet period, then
//! handed out as [`RecomputeJob`]s. Every request bumps a shared
//! generation counter; a job whose generation is no longer the latest
//! stops at the next stage boundary and its result is discarded.
//!
//! Time is passed in explicitly (`now`) so hosts drive the clock and
//! tests stay deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fresco_pipeline::{
    ExportSize, FilterSettings, PipelineDiagnostics, PipelineError, PixelBuffer, RenderOptions,
    RenderOutcome, RenderResult, ResizeFilter,
};
use web_time::Instant;

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How long the settings must stay unchanged before a recompute runs.
    pub quiet_period: Duration,
    /// Seed for the stochastic stages.
    pub seed: u64,
    /// Preview width; `None` renders at source size.
    pub target_width: Option<u32>,
}

impl OrchestratorConfig {
    /// Default quiet period.
    pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

    const fn render_options(&self) -> RenderOptions {
        RenderOptions {
            seed: self.seed,
            target_width: self.target_width,
            resize_filter: ResizeFilter::Triangle,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            quiet_period: Self::DEFAULT_QUIET_PERIOD,
            seed: RenderOptions::DEFAULT_SEED,
            target_width: None,
        }
    }
}

/// What happened to a render.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The result is now the displayed buffer.
    Displayed {
        /// Generation that produced it.
        generation: u64,
        /// Per-stage timing and metrics.
        diagnostics: Box<PipelineDiagnostics>,
    },
    /// A newer request superseded this job.
    Discarded {
        /// Generation of the stale job.
        generation: u64,
    },
    /// A stage failed. The displayed buffer is unchanged.
    Failed {
        /// Generation of the failed job.
        generation: u64,
        /// Error message.
        error: String,
    },
}

/// Settings waiting for their quiet period to elapse.
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    settings: FilterSettings,
    deadline: Instant,
}

/// A render ready to run, possibly on another thread.
#[derive(Debug)]
#[must_use = "a recompute job does nothing until run"]
pub struct RecomputeJob {
    generation: u64,
    latest: Arc<AtomicU64>,
    source: Arc<PixelBuffer>,
    settings: FilterSettings,
    options: RenderOptions,
}

impl RecomputeJob {
    /// Generation this job was issued for.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Settings this job renders with.
    #[must_use]
    pub const fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Whether a newer request has been made since this job was issued.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }

    /// Render against the source, checking for supersession between
    /// stages.
    #[tracing::instrument(skip(self), fields(generation = self.generation))]
    pub fn run(self) -> JobOutput {
        let Self {
            generation,
            latest,
            source,
            settings,
            options,
        } = self;
        let result = fresco_pipeline::render_cancellable(source, settings, options, || {
            latest.load(Ordering::Acquire) != generation
        });
        JobOutput { generation, result }
    }
}

/// Result of [`RecomputeJob::run`], to be handed to
/// [`Orchestrator::complete`].
#[derive(Debug)]
#[must_use = "pass job output to Orchestrator::complete"]
pub struct JobOutput {
    generation: u64,
    result: Result<RenderOutcome, PipelineError>,
}

impl JobOutput {
    /// Generation the job ran for.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns the displayed buffer and the recompute lifecycle.
#[derive(Debug, Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    source: Option<Arc<PixelBuffer>>,
    displayed: Option<Arc<PixelBuffer>>,
    generation: Arc<AtomicU64>,
    pending: Option<PendingRequest>,
}

impl Orchestrator {
    /// An orchestrator with nothing loaded.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Latest generation issued.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The last-loaded source.
    #[must_use]
    pub const fn source(&self) -> Option<&Arc<PixelBuffer>> {
        self.source.as_ref()
    }

    /// The buffer currently on screen.
    #[must_use]
    pub const fn displayed(&self) -> Option<&Arc<PixelBuffer>> {
        self.displayed.as_ref()
    }

    /// Whether settings are waiting for their quiet period.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending request becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Load a new source and render it immediately.
    ///
    /// Any in-flight job is superseded and pending work is dropped. On
    /// failure the previous displayed buffer stays.
    #[tracing::instrument(skip(self, source, settings), fields(width = source.width(), height = source.height()))]
    pub fn load_image(&mut self, source: Arc<PixelBuffer>, settings: FilterSettings) -> JobEvent {
        let generation = self.bump();
        self.pending = None;
        self.source = Some(Arc::clone(&source));
        let options = self.config.render_options();
        self.settle(
            generation,
            fresco_pipeline::render(source, settings, options).map(RenderOutcome::Completed),
        )
    }

    /// Drop the source, pending work, and displayed buffer.
    pub fn clear_image(&mut self) {
        let generation = self.bump();
        tracing::debug!(generation, "image cleared");
        self.source = None;
        self.displayed = None;
        self.pending = None;
    }

    /// Schedule a recompute with `settings` once the quiet period has
    /// elapsed from `now`. A later request replaces an earlier one and
    /// restarts the quiet period. Does nothing without a loaded source.
    pub fn request(&mut self, settings: FilterSettings, now: Instant) {
        if self.source.is_none() {
            tracing::debug!("recompute requested without a source; ignored");
            return;
        }
        let generation = self.bump();
        let deadline = now + self.config.quiet_period;
        tracing::debug!(generation, "recompute scheduled");
        self.pending = Some(PendingRequest { settings, deadline });
    }

    /// The pending job, once its quiet period has elapsed.
    pub fn take_due_job(&mut self, now: Instant) -> Option<RecomputeJob> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        let source = Arc::clone(self.source.as_ref()?);
        self.pending = None;
        Some(RecomputeJob {
            generation: self.generation(),
            latest: Arc::clone(&self.generation),
            source,
            settings: pending.settings,
            options: self.config.render_options(),
        })
    }

    /// Apply a finished job. Only the latest generation may replace the
    /// displayed buffer.
    pub fn complete(&mut self, output: JobOutput) -> JobEvent {
        let JobOutput { generation, result } = output;
        if generation != self.generation() {
            tracing::debug!(generation, latest = self.generation(), "stale result discarded");
            return JobEvent::Discarded { generation };
        }
        self.settle(generation, result)
    }

    fn settle(
        &mut self,
        generation: u64,
        result: Result<RenderOutcome, PipelineError>,
    ) -> JobEvent {
        match result {
            Ok(RenderOutcome::Completed(RenderResult {
                buffer,
                diagnostics,
            })) => {
                tracing::debug!(
                    generation,
                    total_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
                    "render displayed"
                );
                self.displayed = Some(Arc::new(buffer));
                JobEvent::Displayed {
                    generation,
                    diagnostics: Box::new(diagnostics),
                }
            }
            Ok(RenderOutcome::Cancelled { before }) => {
                tracing::debug!(generation, before, "render cancelled");
                JobEvent::Discarded { generation }
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "render failed; keeping previous image");
                JobEvent::Failed {
                    generation,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Run the due job, if any, on the calling thread.
    pub fn poll(&mut self, now: Instant) -> Option<JobEvent> {
        let job = self.take_due_job(now)?;
        let output = job.run();
        Some(self.complete(output))
    }

    /// Render the source at `size` for export.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] when no image is loaded, or
    /// the error of the failing stage.
    pub fn export(
        &self,
        settings: FilterSettings,
        size: ExportSize,
        filter: ResizeFilter,
    ) -> Result<RenderResult, PipelineError> {
        let source = self.source.as_ref().ok_or(PipelineError::EmptyInput)?;
        let options = RenderOptions {
            target_width: size.target_width(),
            resize_filter: filter,
            ..self.config.render_options()
        };
        fresco_pipeline::render(Arc::clone(source), settings, options)
    }
}
