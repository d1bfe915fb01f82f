//! Region-Mosaic: flat-shaded triangles following color regions.
//!
//! Segment into regions, merge similar ones, trace and simplify each
//! outline, fan-triangulate, weld nearby vertices, then paint every
//! triangle with a drop shadow, a jittered fill, and a thin outline.
//! When nothing survives, a uniform triangle grid takes over so the
//! stage always produces shapes.

use std::collections::HashMap;

use rand::Rng;
use tiny_skia::{FillRule, Pixmap, Stroke, Transform};

use super::{contour, polygon_path, region, simplify};
use crate::surface;
use crate::types::{EffectParams, PipelineError, PixelBuffer, Point};

/// Distance tolerance for outline simplification, in pixels.
const SIMPLIFY_TOLERANCE: f64 = 1.0;
/// Drop shadow offset in pixels.
const SHADOW_OFFSET: f32 = 2.0;
const SHADOW_ALPHA: f64 = 0.1;
const OUTLINE_ALPHA: f64 = 0.25;
const OUTLINE_WIDTH: f32 = 1.0;

/// Parameters derived from granularity and randomness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicConfig {
    /// Upper bound on regions kept after merging.
    pub color_count: usize,
    /// Minimum fraction of the image a region must cover.
    pub min_region_weight: f64,
    /// RGB distance for flood fill and merging.
    pub color_threshold: f64,
    /// Minimum interior angle kept by simplification, in degrees.
    pub min_angle: f64,
    /// Vertices closer than this are welded together, in pixels.
    pub weld_tolerance: f64,
    /// Amplitude of per-triangle shade jitter, as a fraction of 255.
    pub shade_variation: f64,
}

impl MosaicConfig {
    /// Derive the configuration for a parameter pair.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_params(params: EffectParams) -> Self {
        let g = params.granularity() / 100.0;
        let r = params.randomness() / 100.0;
        Self {
            color_count: ((15.0 * g).floor() as usize).max(5),
            min_region_weight: 0.01 * (1.0 - g),
            color_threshold: 30.0 * r,
            min_angle: 30.0 * (1.0 - r),
            weld_tolerance: 4.0f64.mul_add(r, 2.0),
            shade_variation: r / 2.0,
        }
    }

    /// Cell size of the fallback grid, in pixels.
    #[must_use]
    pub fn fallback_cell(&self) -> u32 {
        u32::try_from(100usize.saturating_sub(self.color_count))
            .unwrap_or(20)
            .max(20)
    }
}

/// A filled triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Vertices in drawing order.
    pub points: [Point; 3],
    /// Base fill color.
    pub color: [f64; 3],
}

/// Everything the mosaic will paint.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSet {
    /// Triangles in painting order.
    pub triangles: Vec<Triangle>,
    /// Regions that survived merging.
    pub region_count: usize,
    /// Whether the uniform grid replaced the region shapes.
    pub used_fallback: bool,
}

/// Segment the buffer and build the triangles to paint.
pub fn build_shapes<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    config: &MosaicConfig,
    rng: &mut R,
) -> ShapeSet {
    let regions = region::segment(
        buffer,
        config.color_threshold,
        config.min_region_weight,
        rng,
    );
    let regions = region::merge(regions, config.color_threshold, config.color_count);

    let mut triangles = Vec::new();
    for region in &regions {
        let outline = contour::trace_boundary(&region.pixels);
        let outline = simplify::simplify_closed(&outline, SIMPLIFY_TOLERANCE, config.min_angle);
        triangles.extend(fan(outline.points(), region.color));
    }
    weld(&mut triangles, config.weld_tolerance);

    let region_count = regions.len();
    if triangles.is_empty() {
        return ShapeSet {
            triangles: grid(buffer, config.fallback_cell()),
            region_count,
            used_fallback: true,
        };
    }
    ShapeSet {
        triangles,
        region_count,
        used_fallback: false,
    }
}

/// Render the mosaic.
///
/// # Errors
///
/// Returns [`PipelineError::SurfaceUnavailable`] if the drawing surface
/// cannot be allocated.
pub fn render<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    params: EffectParams,
    rng: &mut R,
) -> Result<PixelBuffer, PipelineError> {
    let mut pixmap = surface::blank(buffer.width(), buffer.height())?;
    let config = MosaicConfig::from_params(params);
    let shapes = build_shapes(buffer, &config, rng);
    tracing::debug!(
        regions = shapes.region_count,
        triangles = shapes.triangles.len(),
        fallback = shapes.used_fallback,
        "mosaic shapes built"
    );
    paint_shapes(&mut pixmap, &shapes.triangles, config.shade_variation, rng);
    Ok(surface::from_pixmap(&pixmap))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn paint_shapes<R: Rng + ?Sized>(
    pixmap: &mut Pixmap,
    triangles: &[Triangle],
    shade_variation: f64,
    rng: &mut R,
) {
    let shadow_paint = surface::solid_paint([0, 0, 0], SHADOW_ALPHA);
    let outline_paint = surface::solid_paint([0, 0, 0], OUTLINE_ALPHA);
    let stroke = Stroke {
        width: OUTLINE_WIDTH,
        ..Stroke::default()
    };

    for triangle in triangles {
        let Some(path) = polygon_path(&triangle.points) else {
            continue;
        };

        pixmap.fill_path(
            &path,
            &shadow_paint,
            FillRule::Winding,
            Transform::from_translate(SHADOW_OFFSET, SHADOW_OFFSET),
            None,
        );

        let shift = (rng.random::<f64>() - 0.5) * shade_variation * 255.0;
        let fill = triangle
            .color
            .map(|c| (c + shift).round().clamp(0.0, 255.0) as u8);
        pixmap.fill_path(
            &path,
            &surface::solid_paint(fill, 1.0),
            FillRule::Winding,
            Transform::identity(),
            None,
        );

        pixmap.stroke_path(&path, &outline_paint, &stroke, Transform::identity(), None);
    }
}

/// Fan-triangulate a closed outline around its first vertex.
fn fan(points: &[Point], color: [f64; 3]) -> impl Iterator<Item = Triangle> + '_ {
    let anchor = points.first().copied();
    points.windows(2).skip(1).filter_map(move |pair| {
        Some(Triangle {
            points: [anchor?, pair[0], pair[1]],
            color,
        })
    })
}

/// Snap each vertex onto the first earlier vertex within `tolerance`.
///
/// Canonical vertices are bucketed into `tolerance`-sized cells, so each
/// lookup only inspects the 3x3 block of cells around the vertex.
fn weld(triangles: &mut [Triangle], tolerance: f64) {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return;
    }
    let limit = tolerance * tolerance;
    #[allow(clippy::cast_possible_truncation)]
    let cell_of = |p: Point| ((p.x / tolerance).floor() as i64, (p.y / tolerance).floor() as i64);

    let mut canonical: Vec<Point> = Vec::new();
    let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for vertex in triangles.iter_mut().flat_map(|t| t.points.iter_mut()) {
        let (cx, cy) = cell_of(*vertex);
        let nearest = (cx - 1..=cx + 1)
            .flat_map(|x| (cy - 1..=cy + 1).map(move |y| (x, y)))
            .filter_map(|key| cells.get(&key))
            .flatten()
            .copied()
            .filter(|&i| canonical[i].distance_squared(*vertex) <= limit)
            .min();
        match nearest {
            Some(i) => *vertex = canonical[i],
            None => {
                cells.entry((cx, cy)).or_default().push(canonical.len());
                canonical.push(*vertex);
            }
        }
    }
}

/// Two triangles per `cell`-sized square, colored by the cell center.
fn grid(buffer: &PixelBuffer, cell: u32) -> Vec<Triangle> {
    let mut triangles = Vec::new();
    let size = f64::from(cell);
    for y in (0..buffer.height()).step_by(cell as usize) {
        for x in (0..buffer.width()).step_by(cell as usize) {
            let (fx, fy) = (f64::from(x), f64::from(y));
            let [r, g, b, _] = buffer.sample_clamped(fx + size / 2.0, fy + size / 2.0);
            let color = [f64::from(r), f64::from(g), f64::from(b)];
            let corners = [
                Point::new(fx, fy),
                Point::new(fx + size, fy),
                Point::new(fx + size, fy + size),
                Point::new(fx, fy + size),
            ];
            triangles.push(Triangle {
                points: [corners[0], corners[1], corners[2]],
                color,
            });
            triangles.push(Triangle {
                points: [corners[0], corners[2], corners[3]],
                color,
            });
        }
    }
    triangles
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn quadrants(size: u32) -> PixelBuffer {
        let colors = [
            [230, 30, 30, 255],
            [30, 200, 40, 255],
            [20, 40, 220, 255],
            [240, 230, 20, 255],
        ];
        let mut samples = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let q = usize::from(x >= size / 2) + 2 * usize::from(y >= size / 2);
                samples.extend_from_slice(&colors[q]);
            }
        }
        PixelBuffer::new(size, size, samples).unwrap()
    }

    #[test]
    fn config_matches_parameter_ranges() {
        let c = MosaicConfig::from_params(EffectParams::new(100, 100));
        assert_eq!(c.color_count, 15);
        assert!(c.min_region_weight.abs() < 1e-12);
        assert!((c.color_threshold - 30.0).abs() < 1e-12);
        assert!(c.min_angle.abs() < 1e-12);
        assert!((c.weld_tolerance - 6.0).abs() < 1e-12);

        let c = MosaicConfig::from_params(EffectParams::new(0, 0));
        assert_eq!(c.color_count, 5);
        assert!((c.min_angle - 30.0).abs() < 1e-12);
        assert_eq!(c.fallback_cell(), 95);
    }

    #[test]
    fn uniform_image_produces_shapes() {
        let buf = PixelBuffer::filled(30, 20, [90, 90, 90, 255]);
        let config = MosaicConfig::from_params(EffectParams::default());
        let shapes = build_shapes(&buf, &config, &mut StdRng::seed_from_u64(5));
        assert!(!shapes.triangles.is_empty());
    }

    #[test]
    fn single_pixel_falls_back_to_grid() {
        let buf = PixelBuffer::filled(1, 1, [10, 20, 30, 255]);
        let config = MosaicConfig::from_params(EffectParams::default());
        let shapes = build_shapes(&buf, &config, &mut StdRng::seed_from_u64(5));
        assert!(shapes.used_fallback);
        assert_eq!(shapes.triangles.len(), 2);
        assert_eq!(shapes.triangles[0].color, [10.0, 20.0, 30.0]);
    }

    #[test]
    fn region_count_respects_color_count() {
        let buf = quadrants(40);
        for granularity in [0, 50, 100] {
            let config = MosaicConfig::from_params(EffectParams::new(granularity, 50));
            let shapes = build_shapes(&buf, &config, &mut StdRng::seed_from_u64(2));
            assert!(shapes.region_count <= config.color_count);
            assert!(shapes.region_count >= 1);
        }
    }

    #[test]
    fn fan_of_square_is_two_triangles() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let tris: Vec<_> = fan(&square, [0.0; 3]).collect();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[1].points, [square[0], square[2], square[3]]);
        assert_eq!(fan(&square[..2], [0.0; 3]).count(), 0);
    }

    #[test]
    fn weld_snaps_close_vertices() {
        let mut tris = vec![
            Triangle {
                points: [
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                    Point::new(0.0, 10.0),
                ],
                color: [0.0; 3],
            },
            Triangle {
                points: [
                    Point::new(10.5, 0.5),
                    Point::new(20.0, 0.0),
                    Point::new(0.0, 30.0),
                ],
                color: [0.0; 3],
            },
        ];
        weld(&mut tris, 2.0);
        assert_eq!(tris[1].points[0], Point::new(10.0, 0.0));
        assert_eq!(tris[1].points[1], Point::new(20.0, 0.0));
    }

    /// Linear scan over every earlier canonical vertex.
    fn weld_by_scan(triangles: &mut [Triangle], tolerance: f64) {
        let limit = tolerance * tolerance;
        let mut canonical: Vec<Point> = Vec::new();
        for vertex in triangles.iter_mut().flat_map(|t| t.points.iter_mut()) {
            match canonical
                .iter()
                .find(|c| c.distance_squared(*vertex) <= limit)
            {
                Some(&c) => *vertex = c,
                None => canonical.push(*vertex),
            }
        }
    }

    #[test]
    fn weld_matches_linear_scan_across_cell_edges() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tris: Vec<Triangle> = (0..400)
            .map(|_| Triangle {
                points: std::array::from_fn(|_| {
                    Point::new(
                        rng.random_range(0.0..60.0),
                        rng.random_range(0.0..60.0),
                    )
                }),
                color: [0.0; 3],
            })
            .collect();
        let mut expected = tris.clone();
        weld(&mut tris, 3.0);
        weld_by_scan(&mut expected, 3.0);
        assert_eq!(tris, expected);
    }

    #[test]
    fn weld_ignores_degenerate_tolerance() {
        let original = vec![Triangle {
            points: [
                Point::new(0.0, 0.0),
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0),
            ],
            color: [0.0; 3],
        }];
        let mut tris = original.clone();
        weld(&mut tris, 0.0);
        assert_eq!(tris, original);
    }

    #[test]
    fn render_keeps_dimensions_and_paints() {
        let buf = quadrants(24);
        let out = render(&buf, EffectParams::default(), &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(out.dimensions(), buf.dimensions());
        assert!(out.samples().chunks_exact(4).any(|px| px[3] > 0));
    }

    #[test]
    fn render_is_deterministic_for_a_seed() {
        let buf = quadrants(24);
        let a = render(&buf, EffectParams::new(70, 80), &mut StdRng::seed_from_u64(11)).unwrap();
        let b = render(&buf, EffectParams::new(70, 80), &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }
}
