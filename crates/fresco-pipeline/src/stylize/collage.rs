//! Segmented collage: overlapping, slightly rotated cut-outs of a
//! contrast-boosted copy of the image, laid onto paper with bold accent
//! strokes, a canvas texture and a vignette.

use std::f64::consts::{FRAC_PI_2, PI};

use rand::Rng;
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, Mask, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};

use super::{centered, polygon_path};
use crate::surface;
use crate::types::{EffectParams, PipelineError, PixelBuffer, Point};

const MAX_GRID: f64 = 12.0;
const MIN_GRID: u32 = 2;
const OVERLAP: f64 = 0.12;
const DISTORTION: f64 = 0.05;
const MAX_ROTATION: f64 = PI / 12.0;
const BACKGROUND: [u8; 3] = [0xF5, 0xF0, 0xE1];
const BORDER_WIDTH: f64 = 0.006;
const BORDER_ALPHA: f64 = 0.8;
const ACCENT_COUNT: usize = 6;
const ACCENT_WIDTH: f64 = 0.008;
const ACCENT_ALPHA: f64 = 0.85;
const CONTRAST: f64 = 60.0;
const SATURATION_BOOST: f64 = 0.3;
const NOISE_ALPHA: u8 = 15;
const WEAVE_SPACING: u32 = 3;
const WEAVE_ALPHA: f64 = 0.03;
const VIGNETTE: f64 = 0.2;

/// Number of cells along each axis.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_size(granularity: f64) -> u32 {
    ((MAX_GRID * (100.0 - granularity) / 100.0).round() as u32).max(MIN_GRID)
}

/// Render the collage.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if a drawing surface
/// cannot be allocated.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    params: EffectParams,
    rng: &mut R,
) -> Result<PixelBuffer, PipelineError> {
    let (width, height) = (buffer.width(), buffer.height());
    let mut pixmap = surface::blank(width, height)?;
    let (w, h) = (f64::from(width), f64::from(height));
    let min_dim = w.min(h);
    let r = params.randomness();

    if let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
        pixmap.fill_rect(
            rect,
            &surface::solid_paint(BACKGROUND, 1.0),
            Transform::identity(),
            None,
        );
    }

    let enhanced = enhance(buffer);
    let n = grid_size(params.granularity());
    let (cell_w, cell_h) = (w / f64::from(n), h / f64::from(n));
    let (ext_w, ext_h) = (cell_w * (1.0 + OVERLAP), cell_h * (1.0 + OVERLAP));
    let distortion = cell_w * DISTORTION * r / 50.0;
    let border = Stroke {
        width: (min_dim * BORDER_WIDTH).max(1.0) as f32,
        ..Stroke::default()
    };
    let border_paint = surface::solid_paint([0, 0, 0], BORDER_ALPHA);
    let cell_paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };

    for i in 0..n {
        for j in 0..n {
            let x = f64::from(i) * cell_w;
            let y = f64::from(j) * cell_h;
            let mut inset = || rng.random::<f64>() * distortion;
            let quad = [
                Point::new(x + inset(), y + inset()),
                Point::new(x + ext_w - inset(), y + inset()),
                Point::new(x + ext_w - inset(), y + ext_h - inset()),
                Point::new(x + inset(), y + ext_h - inset()),
            ];
            let angle = centered(rng) * MAX_ROTATION * r / 50.0;

            let Some(clip) = polygon_path(&quad) else {
                continue;
            };
            let Some(mut mask) = Mask::new(width, height) else {
                continue;
            };
            mask.fill_path(&clip, FillRule::Winding, true, Transform::identity());

            let (x0, y0) = (x.floor() as u32, y.floor() as u32);
            let Some(cell) = crop(&enhanced, x0, y0, ext_w.ceil() as u32, ext_h.ceil() as u32)
            else {
                continue;
            };
            let rotation =
                surface::rotate_scale_about(angle, 1.0, x + ext_w / 2.0, y + ext_h / 2.0);
            pixmap.draw_pixmap(
                x0 as i32,
                y0 as i32,
                cell.as_ref(),
                &cell_paint,
                rotation,
                Some(&mask),
            );
            pixmap.stroke_path(
                &clip,
                &border_paint,
                &border,
                Transform::identity(),
                Some(&mask),
            );
        }
    }

    accents(&mut pixmap, min_dim, rng);

    let texture = texture(width, height, rng)?;
    pixmap.draw_pixmap(
        0,
        0,
        texture.as_ref(),
        &PixmapPaint {
            blend_mode: BlendMode::Multiply,
            ..PixmapPaint::default()
        },
        Transform::identity(),
        None,
    );

    Ok(vignette(&surface::from_pixmap(&pixmap)))
}

/// Contrast then saturation boost, clamping after each step.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn enhance_pixel(px: [u8; 4]) -> [u8; 4] {
    let factor = (259.0 * (CONTRAST + 255.0)) / (255.0 * (259.0 - CONTRAST));
    let [r, g, b] =
        [px[0], px[1], px[2]].map(|c| factor.mul_add(f64::from(c) - 128.0, 128.0).clamp(0.0, 255.0));
    let mean = (r + g + b) / 3.0;
    let [r, g, b] = [r, g, b].map(|c| {
        (c - mean)
            .mul_add(SATURATION_BOOST, c)
            .round()
            .clamp(0.0, 255.0) as u8
    });
    [r, g, b, px[3]]
}

fn enhance(buffer: &PixelBuffer) -> PixelBuffer {
    let mut samples = buffer.samples().to_vec();
    for px in samples.chunks_exact_mut(4) {
        px.copy_from_slice(&enhance_pixel([px[0], px[1], px[2], px[3]]));
    }
    PixelBuffer::new(buffer.width(), buffer.height(), samples).unwrap_or_else(|_| buffer.clone())
}

/// Copy the `w`×`h` region at `(x, y)` onto its own surface, clipped to
/// the buffer. `None` when nothing of the region lies inside.
fn crop(buffer: &PixelBuffer, x: u32, y: u32, w: u32, h: u32) -> Option<Pixmap> {
    let w = w.min(buffer.width().saturating_sub(x));
    let h = h.min(buffer.height().saturating_sub(y));
    if w == 0 || h == 0 {
        return None;
    }
    let stride = buffer.width() as usize * 4;
    let mut samples = Vec::with_capacity(w as usize * h as usize * 4);
    for row in y..y + h {
        let start = row as usize * stride + x as usize * 4;
        samples.extend_from_slice(&buffer.samples()[start..start + w as usize * 4]);
    }
    let cell = PixelBuffer::new(w, h, samples).ok()?;
    surface::to_pixmap(&cell).ok()
}

#[allow(clippy::cast_possible_truncation)]
fn accents<R: Rng + ?Sized>(pixmap: &mut Pixmap, min_dim: f64, rng: &mut R) {
    let (w, h) = (f64::from(pixmap.width()), f64::from(pixmap.height()));
    let paint = surface::solid_paint([0, 0, 0], ACCENT_ALPHA);
    let stroke = Stroke {
        width: (min_dim * ACCENT_WIDTH) as f32,
        ..Stroke::default()
    };
    for _ in 0..ACCENT_COUNT {
        let x = w * rng.random::<f64>().mul_add(0.6, 0.2);
        let y = h * rng.random::<f64>().mul_add(0.6, 0.2);
        let length = min_dim * rng.random::<f64>().mul_add(0.3, 0.2);
        let angle = (rng.random::<f64>() * 4.0).round() * FRAC_PI_2;
        let mut pb = PathBuilder::new();
        pb.move_to(x as f32, y as f32);
        pb.line_to(
            angle.cos().mul_add(length, x) as f32,
            angle.sin().mul_add(length, y) as f32,
        );
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

/// Faint paper grain with a woven line grid.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn texture<R: Rng + ?Sized>(width: u32, height: u32, rng: &mut R) -> Result<Pixmap, PipelineError> {
    let mut samples = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..u64::from(width) * u64::from(height) {
        let value = (255.0 * rng.random::<f64>().mul_add(0.05, 0.95)) as u8;
        samples.extend_from_slice(&[value, value, value, NOISE_ALPHA]);
    }
    let grain = PixelBuffer::new(width, height, samples).map_err(|_| {
        PipelineError::SurfaceUnavailable { width, height }
    })?;
    let mut pixmap = surface::to_pixmap(&grain)?;

    let paint = surface::solid_paint([0, 0, 0], WEAVE_ALPHA);
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    let mut pb = PathBuilder::new();
    for x in (0..width).step_by(WEAVE_SPACING as usize) {
        pb.move_to(x as f32, 0.0);
        pb.line_to(x as f32, height as f32);
    }
    for y in (0..height).step_by(WEAVE_SPACING as usize) {
        pb.move_to(0.0, y as f32);
        pb.line_to(width as f32, y as f32);
    }
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
    Ok(pixmap)
}

/// Darken towards the edges: black at alpha `VIGNETTE * d / max(w, h)`
/// composited over each pixel at distance `d` from the center.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn vignette(buffer: &PixelBuffer) -> PixelBuffer {
    let (w, h) = (f64::from(buffer.width()), f64::from(buffer.height()));
    let reach = w.max(h);
    let center = Point::new(w / 2.0, h / 2.0);
    let mut samples = buffer.samples().to_vec();
    for (i, px) in samples.chunks_exact_mut(4).enumerate() {
        let x = (i % buffer.width() as usize) as f64 + 0.5;
        let y = (i / buffer.width() as usize) as f64 + 0.5;
        let shade = (VIGNETTE * center.distance(Point::new(x, y)) / reach).min(1.0);
        let dst_a = f64::from(px[3]) / 255.0;
        let out_a = shade + dst_a * (1.0 - shade);
        if out_a <= 0.0 {
            continue;
        }
        for c in &mut px[..3] {
            *c = (f64::from(*c) * dst_a * (1.0 - shade) / out_a)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        px[3] = (out_a * 255.0).round() as u8;
    }
    PixelBuffer::new(buffer.width(), buffer.height(), samples).unwrap_or_else(|_| buffer.clone())
}
