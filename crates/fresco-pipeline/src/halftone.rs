//! Channel-separated halftone screening.
//!
//! Each of the R, G and B channels is screened independently into marks
//! of its complementary printing ink (magenta, yellow, cyan), each ink
//! slightly misregistered. Marks are combined with screen blending on a
//! transparent surface, so fully saturated overlapping marks add up to
//! white and an all-black input produces nothing at all.

use rand::Rng;
use tiny_skia::{BlendMode, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::surface;
use crate::types::{EffectParams, PipelineError, PixelBuffer, RasterStyle};

/// Marks at or below this intensity are not drawn.
const VISIBILITY_FLOOR: f64 = 0.1;
/// Intensity change that ends a line run.
const RUN_BREAK: f64 = 0.1;
const MARK_ALPHA: f64 = 0.9;
const MAX_STEP: f64 = 20.0;
const JITTER: f64 = 0.33;

/// One printing ink: which source channel it screens, its color, and its
/// registration offset.
#[derive(Debug, Clone, Copy)]
struct Ink {
    channel: usize,
    color: [u8; 3],
    offset: (f64, f64),
}

const INKS: [Ink; 3] = [
    Ink {
        channel: 0,
        color: [255, 0, 255],
        offset: (0.0, 0.0),
    },
    Ink {
        channel: 1,
        color: [255, 255, 0],
        offset: (1.0, 1.0),
    },
    Ink {
        channel: 2,
        color: [0, 255, 255],
        offset: (-1.0, -1.0),
    },
];

/// Block size in pixels for a granularity in `[0, 100]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn step_size(granularity: f64) -> u32 {
    (MAX_STEP * (1.0 - granularity / 100.0)).round().max(1.0) as u32
}

/// One channel of the input as intensities.
struct Channel<'a> {
    buffer: &'a PixelBuffer,
    index: usize,
}

impl Channel<'_> {
    /// Intensity in `[0, 1]` at `(x, y)`.
    fn at(&self, x: u32, y: u32) -> f64 {
        self.buffer
            .pixel(x, y)
            .map_or(0.0, |px| f64::from(px[self.index]) / 255.0)
    }

    /// Mean intensity of the block at `(x, y)`, clipped to the buffer.
    #[allow(clippy::cast_precision_loss)]
    fn block_mean(&self, x: u32, y: u32, step: u32) -> f64 {
        let x_end = (x + step).min(self.buffer.width());
        let y_end = (y + step).min(self.buffer.height());
        let mut sum = 0.0;
        let mut count = 0u64;
        for yy in y..y_end {
            for xx in x..x_end {
                sum += self.at(xx, yy);
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Screen `buffer` into halftone marks.
///
/// [`RasterStyle::None`] returns an identical copy.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if the drawing surface
/// cannot be allocated.
#[tracing::instrument(skip(buffer, rng), fields(width = buffer.width(), height = buffer.height()))]
pub fn apply<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    style: RasterStyle,
    params: EffectParams,
    rng: &mut R,
) -> Result<PixelBuffer, PipelineError> {
    if style == RasterStyle::None {
        return Ok(buffer.clone());
    }

    let mut pixmap = surface::blank(buffer.width(), buffer.height())?;
    let step = step_size(params.granularity());
    let randomness = params.randomness();

    for ink in INKS {
        let channel = Channel {
            buffer,
            index: ink.channel,
        };
        match style {
            RasterStyle::None => {}
            RasterStyle::Dots => dots(&mut pixmap, &channel, ink, step, randomness, rng),
            RasterStyle::LinesHorizontal => {
                horizontal_lines(&mut pixmap, &channel, ink, step, randomness, rng);
            }
            RasterStyle::LinesVertical => {
                vertical_lines(&mut pixmap, &channel, ink, step, randomness, rng);
            }
        }
    }

    Ok(surface::from_pixmap(&pixmap))
}

/// A fresh screen-blended paint for a single mark.
fn ink_paint(ink: Ink, intensity: f64) -> Paint<'static> {
    let mut paint = surface::solid_paint(ink.color, MARK_ALPHA * intensity);
    paint.blend_mode = BlendMode::Screen;
    paint
}

#[allow(clippy::cast_possible_truncation)]
fn dots<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    channel: &Channel<'_>,
    ink: Ink,
    step: u32,
    randomness: f64,
    rng: &mut R,
) {
    let (width, height) = (channel.buffer.width(), channel.buffer.height());
    let half = f64::from(step) / 2.0;
    let jitter = randomness / 50.0 * f64::from(step) * JITTER;
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);

    for y in (0..height).step_by(step as usize) {
        for x in (0..width).step_by(step as usize) {
            let intensity = channel.block_mean(x, y, step);
            if intensity <= VISIBILITY_FLOOR {
                continue;
            }
            let jx = (rng.random::<f64>() - 0.5) * jitter;
            let jy = (rng.random::<f64>() - 0.5) * jitter;
            let cx = (f64::from(x) + ink.offset.0 + half + jx).clamp(0.0, max_x);
            let cy = (f64::from(y) + ink.offset.1 + half + jy).clamp(0.0, max_y);

            let base = half * intensity;
            let variation = base * 0.2 * randomness / 100.0;
            let radius = (rng.random::<f64>() - 0.5).mul_add(variation, base);

            if let Some(disc) = PathBuilder::from_circle(cx as f32, cy as f32, radius as f32) {
                pixmap.fill_path(
                    &disc,
                    &ink_paint(ink, intensity),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }
    }
}

/// A run of similar intensity along one scan line.
struct Run {
    start: u32,
    end: u32,
    intensity: f64,
}

/// Split a scan line of `len` samples into runs. A run closes when the
/// intensity moves more than [`RUN_BREAK`] away from the run's opening
/// intensity, or at the last sample. Only runs above the visibility floor
/// are returned.
fn runs(len: u32, sample: impl Fn(u32) -> f64) -> Vec<Run> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut current = 0.0;
    for i in 0..len {
        let intensity = sample(i);
        if (intensity - current).abs() > RUN_BREAK || i + 1 == len {
            if current > VISIBILITY_FLOOR {
                out.push(Run {
                    start,
                    end: i,
                    intensity: current,
                });
            }
            start = i;
            current = intensity;
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn horizontal_lines<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    channel: &Channel<'_>,
    ink: Ink,
    step: u32,
    randomness: f64,
    rng: &mut R,
) {
    let jitter = randomness / 100.0 * f64::from(step) * JITTER;
    for y in (0..channel.buffer.height()).step_by(step as usize) {
        for run in runs(channel.buffer.width(), |x| channel.at(x, y)) {
            let line_y = (rng.random::<f64>() - 0.5).mul_add(jitter, f64::from(y) + ink.offset.1);
            stroke_run(
                pixmap,
                ink,
                step,
                &run,
                (f64::from(run.start) + ink.offset.0, line_y),
                (f64::from(run.end) + ink.offset.0, line_y),
            );
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn vertical_lines<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    channel: &Channel<'_>,
    ink: Ink,
    step: u32,
    randomness: f64,
    rng: &mut R,
) {
    let jitter = randomness / 100.0 * f64::from(step) * JITTER;
    for x in (0..channel.buffer.width()).step_by(step as usize) {
        for run in runs(channel.buffer.height(), |y| channel.at(x, y)) {
            let line_x = (rng.random::<f64>() - 0.5).mul_add(jitter, f64::from(x) + ink.offset.0);
            stroke_run(
                pixmap,
                ink,
                step,
                &run,
                (line_x, f64::from(run.start) + ink.offset.1),
                (line_x, f64::from(run.end) + ink.offset.1),
            );
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn stroke_run(
    pixmap: &mut Pixmap,
    ink: Ink,
    step: u32,
    run: &Run,
    from: (f64, f64),
    to: (f64, f64),
) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0 as f32, from.1 as f32);
    pb.line_to(to.0 as f32, to.1 as f32);
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: (f64::from(step) * run.intensity.mul_add(0.5, 0.5)) as f32,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &ink_paint(ink, run.intensity),
        &stroke,
        Transform::identity(),
        None,
    );
}
