//! fresco-pipeline: Pure raster effect pipeline (sans-IO).
//!
//! Turns a source image into a stylized one through:
//! optional export resize -> tonal adjustment -> painterly stylization ->
//! halftone screening.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! [`PixelBuffer`]s and returns new buffers. Decoding from encoded bytes
//! is provided through the `image` crate, but reading files, scheduling
//! and persistence live in `fresco-editor` and `fresco-cli`.
//!
//! Stochastic stages take a caller-supplied generator; [`render`] seeds
//! one per stage from [`RenderOptions::seed`], so output is reproducible.

pub mod diagnostics;
pub mod halftone;
pub mod pipeline;
pub mod resize;
pub mod stylize;
pub mod surface;
pub mod tonal;
pub mod types;

pub use diagnostics::PipelineDiagnostics;
pub use pipeline::{
    Pipeline, RenderOptions, RenderOutcome, RenderResult, render, render_cancellable,
};
pub use resize::{ExportSize, ResizeFilter};
pub use tonal::TonalAdjustments;
pub use types::{
    ArtStyle, Dimensions, EffectParams, FilterSettings, PipelineError, PixelBuffer, Point,
    Polyline, RasterStyle,
};
