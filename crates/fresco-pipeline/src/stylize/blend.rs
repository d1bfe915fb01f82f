//! Layered blend: rotated, shrinking copies of the image stacked with
//! alternating screen and multiply modes under a diagonal color wash.

use tiny_skia::{
    BlendMode, Color, FilterQuality, GradientStop, LinearGradient, Paint, PixmapPaint, Rect,
    SpreadMode, Transform,
};

use crate::surface;
use crate::types::{PipelineError, PixelBuffer};

const LAYERS: u32 = 3;
const LAYER_ROTATION_DEG: f64 = 120.0;
const LAYER_SHRINK: f64 = 0.2;
/// 0.2 opacity.
const WASH_ALPHA: u8 = 51;

/// Render the layered blend. This style has no stochastic component.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if a drawing surface
/// cannot be allocated.
#[allow(clippy::cast_precision_loss)]
pub fn render(buffer: &PixelBuffer) -> Result<PixelBuffer, PipelineError> {
    let source = surface::to_pixmap(buffer)?;
    let mut pixmap = surface::blank(buffer.width(), buffer.height())?;
    let (w, h) = (f64::from(buffer.width()), f64::from(buffer.height()));

    for i in 0..LAYERS {
        let layer = f64::from(i);
        let transform = surface::rotate_scale_about(
            (LAYER_ROTATION_DEG * layer).to_radians(),
            LAYER_SHRINK.mul_add(-layer, 1.0),
            w / 2.0,
            h / 2.0,
        );
        let paint = PixmapPaint {
            blend_mode: if i % 2 == 0 {
                BlendMode::Screen
            } else {
                BlendMode::Multiply
            },
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    }

    let (wf, hf) = (buffer.width() as f32, buffer.height() as f32);
    let wash = LinearGradient::new(
        tiny_skia::Point::from_xy(0.0, 0.0),
        tiny_skia::Point::from_xy(wf, hf),
        vec![
            GradientStop::new(0.0, Color::from_rgba8(255, 0, 0, WASH_ALPHA)),
            GradientStop::new(0.5, Color::from_rgba8(0, 255, 0, WASH_ALPHA)),
            GradientStop::new(1.0, Color::from_rgba8(0, 0, 255, WASH_ALPHA)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    if let (Some(shader), Some(rect)) = (wash, Rect::from_xywh(0.0, 0.0, wf, hf)) {
        let paint = Paint {
            shader,
            blend_mode: BlendMode::Overlay,
            anti_alias: false,
            ..Paint::default()
        };
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    Ok(surface::from_pixmap(&pixmap))
}
