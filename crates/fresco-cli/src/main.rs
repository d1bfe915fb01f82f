//! fresco: render an image through the effect pipeline from the command line.
//!
//! Applies tonal, painterly, and halftone effects to an image file,
//! writes the result as PNG, and prints per-stage diagnostics. Useful for:
//!
//! - Trying style and parameter combinations without the editor
//! - Measuring per-stage durations at export sizes
//! - Reproducing a render from a saved `FilterSettings` JSON document
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin fresco -- [OPTIONS] <INPUT> [-o <OUTPUT>]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use fresco_pipeline::{
    ArtStyle, ExportSize, FilterSettings, PipelineDiagnostics, PixelBuffer, RasterStyle,
    RenderOptions, ResizeFilter,
};

/// Photo effect renderer for fresco.
///
/// Renders an image with the given effect settings and prints detailed
/// per-stage timing and metrics.
#[derive(Parser)]
#[command(name = "fresco", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Write the rendered image as PNG.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Brightness (-100..100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-100..=100))]
    brightness: i8,

    /// Contrast (-100..100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-100..=100))]
    contrast: i8,

    /// Saturation (-100..100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-100..=100))]
    saturation: i8,

    /// Highlights (-100..100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-100..=100))]
    highlights: i8,

    /// Shadows (-100..100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-100..=100))]
    shadows: i8,

    /// Painterly stylization.
    #[arg(long, value_enum, default_value_t = Art::None)]
    art_style: Art,

    /// Stylization granularity (0-100).
    #[arg(long, default_value_t = FilterSettings::DEFAULT_GRANULARITY, value_parser = clap::value_parser!(u8).range(0..=100))]
    art_granularity: u8,

    /// Stylization randomness (0-100).
    #[arg(long, default_value_t = FilterSettings::DEFAULT_RANDOMNESS, value_parser = clap::value_parser!(u8).range(0..=100))]
    art_randomness: u8,

    /// Halftone screen.
    #[arg(long, value_enum, default_value_t = Raster::None)]
    raster_style: Raster,

    /// Halftone granularity (0-100).
    #[arg(long, default_value_t = FilterSettings::DEFAULT_GRANULARITY, value_parser = clap::value_parser!(u8).range(0..=100))]
    raster_granularity: u8,

    /// Halftone randomness (0-100).
    #[arg(long, default_value_t = FilterSettings::DEFAULT_RANDOMNESS, value_parser = clap::value_parser!(u8).range(0..=100))]
    raster_randomness: u8,

    /// Full filter settings as a JSON string.
    ///
    /// When provided, all individual effect flags are ignored. Missing
    /// fields take their defaults and out-of-range values are clamped.
    #[arg(long)]
    settings_json: Option<String>,

    /// Export size preset.
    #[arg(long, value_enum, default_value_t = Size::Original)]
    size: Size,

    /// Export width in pixels; overrides `--size`.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: Option<u32>,

    /// Resampling filter for export resizing.
    #[arg(long, value_enum, default_value_t = Filter::Triangle)]
    resize_filter: Filter,

    /// Seed for the stochastic stages.
    #[arg(long, default_value_t = RenderOptions::DEFAULT_SEED)]
    seed: u64,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Log verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Painterly style selection.
#[derive(Clone, Copy, ValueEnum)]
enum Art {
    /// No stylization.
    None,
    /// Flat-shaded polygons from color regions.
    RegionMosaic,
    /// Irregular brush dabs.
    Stipple,
    /// Rotated, bordered tiles on paper.
    SegmentedCollage,
    /// Screen and multiply composite of rotated copies.
    LayeredBlend,
}

/// Halftone selection.
#[derive(Clone, Copy, ValueEnum)]
enum Raster {
    /// No halftone.
    None,
    /// Discs per block and channel.
    Dots,
    /// Horizontal strokes.
    LinesHorizontal,
    /// Vertical strokes.
    LinesVertical,
}

/// Export size preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Size {
    /// Source width.
    Original,
    /// 1920 px wide.
    Large,
    /// 1280 px wide.
    Medium,
    /// 800 px wide.
    Small,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

const fn art_style(art: Art) -> ArtStyle {
    match art {
        Art::None => ArtStyle::None,
        Art::RegionMosaic => ArtStyle::RegionMosaic,
        Art::Stipple => ArtStyle::Stipple,
        Art::SegmentedCollage => ArtStyle::SegmentedCollage,
        Art::LayeredBlend => ArtStyle::LayeredBlend,
    }
}

const fn raster_style(raster: Raster) -> RasterStyle {
    match raster {
        Raster::None => RasterStyle::None,
        Raster::Dots => RasterStyle::Dots,
        Raster::LinesHorizontal => RasterStyle::LinesHorizontal,
        Raster::LinesVertical => RasterStyle::LinesVertical,
    }
}

const fn resize_filter(filter: Filter) -> ResizeFilter {
    match filter {
        Filter::Nearest => ResizeFilter::Nearest,
        Filter::Triangle => ResizeFilter::Triangle,
        Filter::CatmullRom => ResizeFilter::CatmullRom,
        Filter::Gaussian => ResizeFilter::Gaussian,
        Filter::Lanczos3 => ResizeFilter::Lanczos3,
    }
}

/// Build [`FilterSettings`] from CLI arguments.
///
/// If `--settings-json` is provided, the JSON is parsed directly and all
/// individual effect flags are ignored.
fn settings_from_cli(cli: &Cli) -> Result<FilterSettings, String> {
    if let Some(ref json) = cli.settings_json {
        return serde_json::from_str::<FilterSettings>(json)
            .map(FilterSettings::clamped)
            .map_err(|e| format!("Error parsing --settings-json: {e}"));
    }

    Ok(FilterSettings {
        brightness: cli.brightness,
        contrast: cli.contrast,
        saturation: cli.saturation,
        highlights: cli.highlights,
        shadows: cli.shadows,
        art_style: art_style(cli.art_style),
        art_granularity: cli.art_granularity,
        art_randomness: cli.art_randomness,
        raster_style: raster_style(cli.raster_style),
        raster_granularity: cli.raster_granularity,
        raster_randomness: cli.raster_randomness,
    })
}

/// Resolve the export size from `--width` and `--size`.
const fn export_size(cli: &Cli) -> ExportSize {
    if let Some(width) = cli.width {
        return ExportSize::Custom(width);
    }
    match cli.size {
        Size::Original => ExportSize::Original,
        Size::Large => ExportSize::Large,
        Size::Medium => ExportSize::Medium,
        Size::Small => ExportSize::Small,
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match settings_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let source = match PixelBuffer::decode(&image_bytes) {
        Ok(buffer) => Arc::new(buffer),
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let size = export_size(&cli);
    let options = RenderOptions {
        seed: cli.seed,
        target_width: size.target_width(),
        resize_filter: resize_filter(cli.resize_filter),
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.input.display(),
        image_bytes.len(),
        source.width(),
        source.height(),
    );
    eprintln!("Settings: {settings:#?}");
    eprintln!("Export: {size}, seed {}", options.seed);
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match fresco_pipeline::render(Arc::clone(&source), settings, options) {
            Ok(result) => {
                if cli.json {
                    match serde_json::to_string_pretty(&result.diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", result.diagnostics.report());
                }

                // Write the image on the first run only.
                if run == 0
                    && let Some(ref path) = cli.output
                {
                    let (width, height) = (result.buffer.width(), result.buffer.height());
                    match result
                        .buffer
                        .into_rgba_image()
                        .save_with_format(path, image::ImageFormat::Png)
                    {
                        Ok(()) => {
                            eprintln!("PNG written to {} ({width}x{height})", path.display());
                        }
                        Err(e) => {
                            eprintln!("Error writing PNG to {}: {e}", path.display());
                            return ExitCode::FAILURE;
                        }
                    }
                }

                all_diagnostics.push(result.diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Resize", |d| d.resize.as_ref().map(|s| s.duration)),
        ("Tonal", |d| Some(d.tonal.duration)),
        ("Stylize", |d| Some(d.stylize.duration)),
        ("Halftone", |d| Some(d.halftone.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
