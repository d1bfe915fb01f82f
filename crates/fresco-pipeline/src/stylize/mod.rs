//! Painterly stylization.
//!
//! [`apply`] dispatches on [`ArtStyle`] with an exhaustive `match`, so a
//! new style cannot be added without wiring its renderer here. Each
//! renderer paints onto a fresh tiny-skia surface of the input's size.

pub mod blend;
pub mod collage;
pub mod contour;
pub mod mosaic;
pub mod region;
pub mod simplify;
pub mod stipple;

use rand::Rng;
use tiny_skia::{Path, PathBuilder};

use crate::types::{ArtStyle, EffectParams, PipelineError, PixelBuffer, Point};

/// Apply a stylization to `buffer`.
///
/// [`ArtStyle::None`] returns an identical copy. `rng` drives every
/// stochastic choice, so a seeded generator yields reproducible output.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if a drawing surface
/// cannot be allocated (e.g. for an empty buffer).
#[tracing::instrument(skip(buffer, rng), fields(width = buffer.width(), height = buffer.height()))]
pub fn apply<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    style: ArtStyle,
    params: EffectParams,
    rng: &mut R,
) -> Result<PixelBuffer, PipelineError> {
    let params = EffectParams::new(params.granularity, params.randomness);
    match style {
        ArtStyle::None => Ok(buffer.clone()),
        ArtStyle::RegionMosaic => mosaic::render(buffer, params, rng),
        ArtStyle::Stipple => stipple::render(buffer, params, rng),
        ArtStyle::SegmentedCollage => collage::render(buffer, params, rng),
        ArtStyle::LayeredBlend => blend::render(buffer),
    }
}

/// Closed straight-edged path through `points`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn polygon_path(points: &[Point]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

/// Uniform sample in `[-0.5, 0.5)`.
pub(crate) fn centered<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>() - 0.5
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn checker(size: u32) -> PixelBuffer {
        let mut samples = Vec::new();
        for y in 0..size {
            for x in 0..size {
                if (x / 4 + y / 4) % 2 == 0 {
                    samples.extend_from_slice(&[250, 240, 230, 255]);
                } else {
                    samples.extend_from_slice(&[30, 60, 90, 255]);
                }
            }
        }
        PixelBuffer::new(size, size, samples).unwrap()
    }

    #[test]
    fn none_is_identity() {
        let buf = checker(16);
        let out = apply(
            &buf,
            ArtStyle::None,
            EffectParams::default(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn every_style_keeps_dimensions() {
        let buf = checker(32);
        for style in ArtStyle::ALL {
            let out = apply(
                &buf,
                style,
                EffectParams::default(),
                &mut StdRng::seed_from_u64(4),
            )
            .unwrap();
            assert_eq!(out.dimensions(), buf.dimensions(), "{style}");
        }
    }

    #[test]
    fn every_style_is_reproducible_for_a_seed() {
        let buf = checker(24);
        for style in ArtStyle::ALL {
            let run = || {
                apply(
                    &buf,
                    style,
                    EffectParams::new(60, 90),
                    &mut StdRng::seed_from_u64(77),
                )
                .unwrap()
            };
            assert_eq!(run(), run(), "{style}");
        }
    }

    #[test]
    fn empty_buffer_reports_surface_error() {
        let buf = PixelBuffer::filled(0, 0, [0, 0, 0, 0]);
        let result = apply(
            &buf,
            ArtStyle::Stipple,
            EffectParams::default(),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            result,
            Err(PipelineError::SurfaceUnavailable { .. })
        ));
    }

    #[test]
    fn polygon_path_needs_points() {
        assert!(polygon_path(&[]).is_none());
        assert!(
            polygon_path(&[
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.0),
                Point::new(0.0, 5.0)
            ])
            .is_some()
        );
    }

    #[test]
    fn centered_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..1000 {
            let v = centered(&mut rng);
            assert!((-0.5..0.5).contains(&v));
        }
    }
}
