//! Bridging between straight-alpha [`PixelBuffer`]s and tiny-skia's
//! premultiplied [`Pixmap`] drawing surfaces.

use tiny_skia::{Color, Paint, Pixmap, Transform};

use crate::types::{PipelineError, PixelBuffer};

/// Allocate a transparent surface.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] for zero or oversized
/// dimensions.
pub fn blank(width: u32, height: u32) -> Result<Pixmap, PipelineError> {
    Pixmap::new(width, height).ok_or(PipelineError::SurfaceUnavailable { width, height })
}

/// Copy a buffer onto a new surface, premultiplying alpha.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if the surface cannot be
/// allocated.
pub fn to_pixmap(buffer: &PixelBuffer) -> Result<Pixmap, PipelineError> {
    let mut pixmap = blank(buffer.width(), buffer.height())?;
    for (dst, src) in pixmap
        .data_mut()
        .chunks_exact_mut(4)
        .zip(buffer.samples().chunks_exact(4))
    {
        let a = u16::from(src[3]);
        dst[0] = premultiply(src[0], a);
        dst[1] = premultiply(src[1], a);
        dst[2] = premultiply(src[2], a);
        dst[3] = src[3];
    }
    Ok(pixmap)
}

/// Copy a surface back into a straight-alpha buffer.
#[must_use]
pub fn from_pixmap(pixmap: &Pixmap) -> PixelBuffer {
    let mut samples = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.data().chunks_exact(4) {
        let a = px[3];
        if a == 0 {
            samples.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            samples.extend_from_slice(&[
                demultiply(px[0], a),
                demultiply(px[1], a),
                demultiply(px[2], a),
                a,
            ]);
        }
    }
    PixelBuffer::new(pixmap.width(), pixmap.height(), samples)
        .unwrap_or_else(|_| PixelBuffer::filled(pixmap.width(), pixmap.height(), [0, 0, 0, 0]))
}

/// A solid anti-aliased paint. `alpha` is clamped into `[0, 1]`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn solid_paint(rgb: [u8; 3], alpha: f64) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(
        Color::from_rgba(
            f32::from(rgb[0]) / 255.0,
            f32::from(rgb[1]) / 255.0,
            f32::from(rgb[2]) / 255.0,
            alpha.clamp(0.0, 1.0) as f32,
        )
        .unwrap_or(Color::TRANSPARENT),
    );
    paint.anti_alias = true;
    paint
}

/// Rotate by `radians` and scale uniformly by `scale` about `(cx, cy)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rotate_scale_about(radians: f64, scale: f64, cx: f64, cy: f64) -> Transform {
    let (sin, cos) = radians.sin_cos();
    let a = scale * cos;
    let b = scale * sin;
    let tx = cx - a.mul_add(cx, -b * cy);
    let ty = cy - b.mul_add(cx, a * cy);
    Transform::from_row(a as f32, b as f32, -b as f32, a as f32, tx as f32, ty as f32)
}

/// Rotate by `radians` about the origin, then move the origin to `(x, y)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn placed(radians: f64, x: f64, y: f64) -> Transform {
    let (sin, cos) = radians.sin_cos();
    Transform::from_row(
        cos as f32,
        sin as f32,
        -sin as f32,
        cos as f32,
        x as f32,
        y as f32,
    )
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply(channel: u8, alpha: u16) -> u8 {
    ((u16::from(channel) * alpha + 127) / 255) as u8
}

#[allow(clippy::cast_possible_truncation)]
fn demultiply(channel: u8, alpha: u8) -> u8 {
    let value = (u16::from(channel) * 255 + u16::from(alpha) / 2) / u16::from(alpha);
    value.min(255) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_rejects_zero_size() {
        assert!(matches!(
            blank(0, 10),
            Err(PipelineError::SurfaceUnavailable {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn opaque_pixels_survive_conversion() {
        let buf = PixelBuffer::filled(3, 3, [12, 200, 99, 255]);
        let pixmap = to_pixmap(&buf).unwrap();
        assert_eq!(from_pixmap(&pixmap), buf);
    }

    #[test]
    fn transparent_pixels_become_transparent_black() {
        let buf = PixelBuffer::filled(2, 2, [80, 80, 80, 0]);
        let back = from_pixmap(&to_pixmap(&buf).unwrap());
        assert_eq!(back.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn translucent_pixels_round_within_one_step() {
        let buf = PixelBuffer::filled(1, 1, [200, 100, 50, 128]);
        let back = from_pixmap(&to_pixmap(&buf).unwrap());
        let px = back.pixel(0, 0).unwrap();
        assert_eq!(px[3], 128);
        for (got, want) in px[..3].iter().zip([200u8, 100, 50]) {
            assert!(got.abs_diff(want) <= 2, "{got} vs {want}");
        }
    }

    fn apply(t: Transform, x: f32, y: f32) -> (f32, f32) {
        let mut p = [tiny_skia::Point::from_xy(x, y)];
        t.map_points(&mut p);
        (p[0].x, p[0].y)
    }

    #[test]
    fn rotate_scale_about_keeps_center_fixed() {
        let t = rotate_scale_about(std::f64::consts::FRAC_PI_2, 0.5, 10.0, 20.0);
        let (x, y) = apply(t, 10.0, 20.0);
        assert!((x - 10.0).abs() < 1e-4 && (y - 20.0).abs() < 1e-4);
        // A point 4px right of center ends up 2px below it.
        let (x, y) = apply(t, 14.0, 20.0);
        assert!((x - 10.0).abs() < 1e-4, "{x}");
        assert!((y - 22.0).abs() < 1e-4, "{y}");
    }

    #[test]
    fn placed_rotates_then_translates() {
        let t = placed(std::f64::consts::PI, 5.0, 5.0);
        let (x, y) = apply(t, 1.0, 0.0);
        assert!((x - 4.0).abs() < 1e-4 && (y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn solid_paint_carries_alpha() {
        let paint = solid_paint([255, 0, 0], 0.5);
        let tiny_skia::Shader::SolidColor(color) = paint.shader else {
            unreachable!("solid paint uses a solid shader");
        };
        assert!((color.alpha() - 0.5).abs() < 1e-6);
        assert!((color.red() - 1.0).abs() < 1e-6);
    }
}
