//! Stipple: a field of small irregular brush dabs on a warm wash.
//!
//! Two grid passes (coarse base dabs, then finer detail dabs) sample a
//! scratch copy of the input, followed by a sparse pass of bright
//! highlight dabs where the source is near white.

use std::f64::consts::TAU;

use rand::Rng;
use tiny_skia::{FillRule, Path, PathBuilder, Pixmap, Rect, Transform};

use super::centered;
use crate::surface;
use crate::types::{EffectParams, PipelineError, PixelBuffer};

const BACKGROUND: [u8; 3] = [0xFF, 0xFD, 0xF5];
const BACKGROUND_ALPHA: f64 = 0.9;
const JITTER: f64 = 0.7;
const SATURATION: f64 = 1.2;
const BRIGHTNESS_MIN: f64 = 0.7;
const PRESSURE_MIN: f64 = 0.7;
const PRESSURE_MAX: f64 = 1.0;
const BASE_ALPHA: f64 = 0.8;
const DETAIL_ALPHA: f64 = 0.6;
/// Detail dabs skip samples whose channel sum is below this.
const DETAIL_MIN_SUM: u16 = 100;
/// Highlight dabs only land where the channel sum exceeds this.
const HIGHLIGHT_MIN_SUM: u16 = 600;
const HIGHLIGHT_COLOR: [u8; 3] = [255, 255, 250];
const HIGHLIGHT_ALPHA: f64 = 0.7;
const BRUSH_SLICES: usize = 8;
const MIN_SPACING: f64 = 1.0;
const MIN_DOT: f64 = 0.5;

/// Sizes and probabilities derived from granularity and randomness.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StippleConfig {
    min_dot: f64,
    max_dot: f64,
    base_spacing: f64,
    detail_spacing: f64,
    brightness_max: f64,
    complementary_chance: f64,
    jitter_scale: f64,
    highlight_count: usize,
    brush: Brush,
}

/// Dab shape controls.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Brush {
    irregularity: f64,
    elongation: f64,
    angle_variance: f64,
    roughness: f64,
}

impl StippleConfig {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(params: EffectParams, width: u32, height: u32) -> Self {
        let g = params.granularity();
        let r = params.randomness();
        let min_dim = f64::from(width.min(height));
        let size_scale = 1.0 + (g - 50.0) / 100.0;
        let min_dot = min_dim * 0.007 * size_scale;
        let max_dot = min_dim * 0.01 * size_scale;
        let density = 0.6 * (100.0 - g) / 50.0;
        let spacing_unit = min_dot * density;

        let highlight_count = if g > 0.0 {
            (f64::from(width) * f64::from(height) / (10_000.0 * g / 50.0)) as usize
        } else {
            0
        };

        Self {
            min_dot: min_dot.max(MIN_DOT),
            max_dot: max_dot.max(MIN_DOT),
            base_spacing: (spacing_unit * 2.0 * (100.0 - g) / 50.0).max(MIN_SPACING),
            detail_spacing: (spacing_unit * (100.0 - g) / 50.0).max(MIN_SPACING),
            brightness_max: 1.1 + r / 100.0,
            complementary_chance: (0.2 * r / 50.0).clamp(0.0, 1.0),
            jitter_scale: r / 50.0,
            highlight_count,
            brush: Brush {
                irregularity: r / 50.0,
                elongation: 0.4 * r / 50.0,
                angle_variance: r / 50.0,
                roughness: 0.3 * r / 50.0,
            },
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Base,
    Detail,
}

/// Render the stipple.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if the drawing surface
/// cannot be allocated.
#[allow(clippy::cast_precision_loss)]
pub fn render<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    params: EffectParams,
    rng: &mut R,
) -> Result<PixelBuffer, PipelineError> {
    let mut pixmap = surface::blank(buffer.width(), buffer.height())?;
    let config = StippleConfig::new(params, buffer.width(), buffer.height());
    // Samples come from an untouched copy so earlier dabs never feed
    // later ones.
    let scratch = buffer.clone();

    if let Some(rect) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32) {
        pixmap.fill_rect(
            rect,
            &surface::solid_paint(BACKGROUND, BACKGROUND_ALPHA),
            Transform::identity(),
            None,
        );
    }

    dab_grid(&mut pixmap, &scratch, &config, Pass::Base, rng);
    dab_grid(&mut pixmap, &scratch, &config, Pass::Detail, rng);
    highlights(&mut pixmap, &scratch, &config, rng);

    Ok(surface::from_pixmap(&pixmap))
}

#[allow(clippy::cast_possible_truncation)]
fn dab_grid<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    source: &PixelBuffer,
    config: &StippleConfig,
    pass: Pass,
    rng: &mut R,
) {
    let (spacing, dot, alpha) = match pass {
        Pass::Base => (config.base_spacing, config.max_dot, BASE_ALPHA),
        Pass::Detail => (config.detail_spacing, config.min_dot / 2.0, DETAIL_ALPHA),
    };
    let jitter = JITTER * spacing * config.jitter_scale;
    let (width, height) = (f64::from(source.width()), f64::from(source.height()));

    let mut y = 0.0;
    while y < height {
        let mut x = 0.0;
        while x < width {
            let px = centered(rng).mul_add(jitter, x);
            let py = centered(rng).mul_add(jitter, y);
            x += spacing;

            if px < 0.0 || py < 0.0 || px >= width || py >= height {
                continue;
            }
            let [r, g, b, _] = source.sample_clamped(px.floor(), py.floor());
            if pass == Pass::Detail && u16::from(r) + u16::from(g) + u16::from(b) < DETAIL_MIN_SUM
            {
                continue;
            }

            let size = dot * rng.random::<f64>().mul_add(0.3, 0.7);
            let Some(path) = brush_path(size, &config.brush, rng) else {
                continue;
            };
            let angle = rng.random::<f64>() * TAU * config.brush.angle_variance;

            let (regular, complementary) = dab_colors([r, g, b], config, rng);
            let color = if rng.random_bool(config.complementary_chance) {
                complementary
            } else {
                regular
            };
            let pressure = rng.random_range(PRESSURE_MIN..=PRESSURE_MAX);
            let paint = surface::solid_paint(color, alpha * pressure);

            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                surface::placed(angle, px, py),
                None,
            );
        }
        y += spacing;
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn highlights<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    source: &PixelBuffer,
    config: &StippleConfig,
    rng: &mut R,
) {
    let paint = surface::solid_paint(HIGHLIGHT_COLOR, HIGHLIGHT_ALPHA);
    let (width, height) = (f64::from(source.width()), f64::from(source.height()));
    for _ in 0..config.highlight_count {
        let x = rng.random::<f64>() * width;
        let y = rng.random::<f64>() * height;
        let [r, g, b, _] = source.sample_clamped(x.floor(), y.floor());
        if u16::from(r) + u16::from(g) + u16::from(b) <= HIGHLIGHT_MIN_SUM {
            continue;
        }
        let angle = rng.random::<f64>() * TAU * config.brush.angle_variance;
        if let Some(path) = brush_path(config.min_dot, &config.brush, rng) {
            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                surface::placed(angle, x, y),
                None,
            );
        }
    }
}

/// Saturation-boosted, brightness-jittered color and its channel-rotated
/// complement.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dab_colors<R: Rng + ?Sized>(
    rgb: [u8; 3],
    config: &StippleConfig,
    rng: &mut R,
) -> ([u8; 3], [u8; 3]) {
    let rgb = rgb.map(f64::from);
    let mean = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
    let brightness = rng.random_range(BRIGHTNESS_MIN..=config.brightness_max);
    let [r, g, b] = rgb.map(|c| {
        ((c - mean).mul_add(SATURATION, mean) * brightness)
            .round()
            .clamp(0.0, 255.0) as u8
    });
    ([r, g, b], [b, r, g])
}

/// An irregular closed dab centered on the origin.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn brush_path<R: Rng + ?Sized>(size: f64, brush: &Brush, rng: &mut R) -> Option<Path> {
    let width = size * rng.random::<f64>().mul_add(brush.elongation, 1.0);
    let height = size * (rng.random::<f64>() * brush.elongation).mul_add(-0.5, 1.0);
    let squash = height / width;
    let slice = TAU / BRUSH_SLICES as f64;

    let mut pb = PathBuilder::new();
    for i in 0..=BRUSH_SLICES {
        let angle = i as f64 * slice;
        let radius = if i == BRUSH_SLICES {
            width / 2.0
        } else {
            width / 2.0 * centered(rng).mul_add(brush.irregularity, 1.0)
        };
        let current = radius * centered(rng).mul_add(brush.roughness, 1.0);
        let (sin, cos) = angle.sin_cos();
        let (px, py) = (cos * current, sin * current * squash);

        if i == 0 {
            pb.move_to(px as f32, py as f32);
        } else {
            let control = radius * centered(rng).mul_add(brush.irregularity * 0.5, 1.0);
            let (csin, ccos) = (angle - slice / 2.0).sin_cos();
            pb.quad_to(
                (ccos * control) as f32,
                (csin * control * squash) as f32,
                px as f32,
                py as f32,
            );
        }
    }
    pb.close();
    pb.finish()
}
