//! Angle-constrained Ramer-Douglas-Peucker simplification.
//!
//! Plain RDP keeps the farthest point whenever it lies beyond the
//! distance tolerance. Mosaic outlines additionally refuse split points
//! whose interior angle is at or below a minimum, so the simplified
//! polygons never grow needle-like spikes.

use crate::types::{Point, Polyline};

/// Simplify an outline.
///
/// A point is kept when it is more than `tolerance` pixels from the
/// chord between the current endpoints *and* the angle it forms with
/// those endpoints exceeds `min_angle_deg`. Endpoints are always kept.
/// Outlines with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64, min_angle_deg: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 {
        return polyline.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(
        points,
        0,
        points.len() - 1,
        tolerance,
        min_angle_deg,
        &mut kept,
    );

    Polyline::new(
        points
            .iter()
            .zip(&kept)
            .filter(|&(_, k)| *k)
            .map(|(&p, _)| p)
            .collect(),
    )
}

/// Simplify a closed outline whose last point connects back to the first.
///
/// The ring is split at the point farthest from the first vertex and each
/// half is simplified as an open chain, so the first chord is never
/// degenerate.
#[must_use = "returns the simplified outline"]
pub fn simplify_closed(outline: &Polyline, tolerance: f64, min_angle_deg: f64) -> Polyline {
    let points = outline.points();
    if points.len() < 4 {
        return outline.clone();
    }

    let origin = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|a, b| {
            origin
                .distance_squared(*a.1)
                .total_cmp(&origin.distance_squared(*b.1))
        })
        .map_or(0, |(i, _)| i);
    if far == 0 {
        return Polyline::new(vec![origin]);
    }

    let first = simplify(
        &Polyline::new(points[..=far].to_vec()),
        tolerance,
        min_angle_deg,
    );
    let mut back_half = points[far..].to_vec();
    back_half.push(origin);
    let second = simplify(&Polyline::new(back_half), tolerance, min_angle_deg);

    let mut ring = first.into_points();
    let second = second.into_points();
    // Skip the shared split point and the repeated origin.
    ring.extend_from_slice(&second[1..second.len() - 1]);
    Polyline::new(ring)
}

fn rdp_recurse(
    points: &[Point],
    start: usize,
    end: usize,
    tolerance: f64,
    min_angle_deg: f64,
    kept: &mut [bool],
) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance
        && interior_angle_deg(points[start], points[max_idx], points[end]) > min_angle_deg
    {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, min_angle_deg, kept);
        rdp_recurse(points, max_idx, end, tolerance, min_angle_deg, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
/// Falls back to the distance from `p` to `a` when they coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

/// Angle at `vertex` between the rays towards `a` and `b`, in `[0, 180]`.
/// A degenerate ray yields 180 so it never blocks a split.
fn interior_angle_deg(a: Point, vertex: Point, b: Point) -> f64 {
    let (ax, ay) = (a.x - vertex.x, a.y - vertex.y);
    let (bx, by) = (b.x - vertex.x, b.y - vertex.y);
    let la = ax.hypot(ay);
    let lb = bx.hypot(by);
    if la == 0.0 || lb == 0.0 {
        return 180.0;
    }
    let cos = (ax.mul_add(bx, ay * by) / (la * lb)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn short_outlines_unchanged() {
        assert!(simplify(&Polyline::new(vec![]), 1.0, 10.0).is_empty());
        assert_eq!(simplify(&line(&[(0.0, 0.0), (5.0, 5.0)]), 1.0, 10.0).len(), 2);
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let result = simplify(
            &line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]),
            1.0,
            0.0,
        );
        assert_eq!(result.points(), &[Point::new(0.0, 0.0), Point::new(3.0, 3.0)]);
    }

    #[test]
    fn right_angle_corner_is_kept() {
        let result = simplify(
            &line(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 5.0), (10.0, 10.0)]),
            1.0,
            30.0,
        );
        assert!(result.points().contains(&Point::new(10.0, 0.0)));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn sharp_spike_is_rejected_by_angle() {
        // The spike tip sits 20px off the chord but with a ~11 degree
        // interior angle.
        let spike = line(&[(0.0, 0.0), (2.0, 20.0), (4.0, 0.0)]);
        assert_eq!(simplify(&spike, 1.0, 30.0).len(), 2);
        assert_eq!(simplify(&spike, 1.0, 5.0).len(), 3);
    }

    #[test]
    fn small_deviation_within_tolerance_is_dropped() {
        let result = simplify(&line(&[(0.0, 0.0), (5.0, 0.8), (10.0, 0.0)]), 1.0, 0.0);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn closed_rectangle_reduces_to_corners() {
        let mut ring = Vec::new();
        for x in 0..=10 {
            ring.push((f64::from(x), 0.0));
        }
        for y in 1..=6 {
            ring.push((10.0, f64::from(y)));
        }
        for x in (0..10).rev() {
            ring.push((f64::from(x), 6.0));
        }
        for y in (1..6).rev() {
            ring.push((0.0, f64::from(y)));
        }
        let result = simplify_closed(&line(&ring), 1.0, 20.0);
        assert_eq!(
            result.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 6.0),
                Point::new(0.0, 6.0),
            ]
        );
    }

    #[test]
    fn closed_short_outline_unchanged() {
        let tri = line(&[(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)]);
        assert_eq!(simplify_closed(&tri, 1.0, 20.0), tri);
    }

    #[test]
    fn interior_angle_values() {
        let o = Point::new(0.0, 0.0);
        let right = interior_angle_deg(Point::new(1.0, 0.0), o, Point::new(0.0, 1.0));
        assert!((right - 90.0).abs() < 1e-9);
        let straight = interior_angle_deg(Point::new(-1.0, 0.0), o, Point::new(1.0, 0.0));
        assert!((straight - 180.0).abs() < 1e-9);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
