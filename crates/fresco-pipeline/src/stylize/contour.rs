//! Outline extraction for a single segmented region.
//!
//! Uses 8-connected Moore-neighbor following: start at the region's
//! leftmost-topmost pixel, then repeatedly probe the eight neighbors,
//! beginning three steps counter-clockwise of the last move. The walk
//! ends when it is about to leave the start pixel in the same direction
//! as its first move, so a start pixel that bridges two lobes is passed
//! through rather than treated as the end.

use crate::types::{Point, Polyline};

/// Neighbor offsets in clockwise order starting east (y grows down).
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Trace the outer boundary of a set of pixel coordinates.
///
/// Returns an empty polyline for an empty set and a single point for an
/// isolated pixel. The walk is bounded to `4 * pixels.len() + 8` steps so
/// pathological shapes cannot loop forever.
#[must_use = "returns the traced outline"]
pub fn trace_boundary(pixels: &[(u32, u32)]) -> Polyline {
    let Some(mask) = RegionMask::new(pixels) else {
        return Polyline::default();
    };
    let Some(start) = mask.leftmost_topmost() else {
        return Polyline::default();
    };

    let max_steps = pixels.len().saturating_mul(4).saturating_add(8);
    let mut outline = vec![start];
    let mut current = start;
    let mut dir = 0usize;
    let mut first_dir = None;

    for _ in 0..max_steps {
        let next = (0..8).find_map(|k| {
            let d = (dir + 5 + k) % 8;
            let (dx, dy) = DIRECTIONS[d];
            let candidate = (current.0 + dx, current.1 + dy);
            mask.contains(candidate).then_some((candidate, d))
        });

        let Some((next_pixel, next_dir)) = next else {
            break;
        };
        if current == start {
            match first_dir {
                None => first_dir = Some(next_dir),
                Some(d) if d == next_dir => break,
                Some(_) => {}
            }
        }
        current = next_pixel;
        dir = next_dir;
        outline.push(current);
    }
    // The closing return to the start pixel is implied.
    if outline.len() > 1 && outline.last() == Some(&start) {
        outline.pop();
    }

    #[allow(clippy::cast_precision_loss)]
    let points = outline
        .into_iter()
        .map(|(x, y)| Point::new(x as f64, y as f64))
        .collect();
    Polyline::new(points)
}

/// Dense membership grid over a region's bounding box.
struct RegionMask {
    min_x: i64,
    min_y: i64,
    width: i64,
    height: i64,
    cells: Vec<bool>,
}

impl RegionMask {
    fn new(pixels: &[(u32, u32)]) -> Option<Self> {
        let min_x = i64::from(pixels.iter().map(|p| p.0).min()?);
        let min_y = i64::from(pixels.iter().map(|p| p.1).min()?);
        let max_x = i64::from(pixels.iter().map(|p| p.0).max()?);
        let max_y = i64::from(pixels.iter().map(|p| p.1).max()?);
        let width = max_x - min_x + 1;
        let height = max_y - min_y + 1;

        let mut mask = Self {
            min_x,
            min_y,
            width,
            height,
            cells: vec![false; usize::try_from(width * height).ok()?],
        };
        for &(x, y) in pixels {
            if let Some(i) = mask.index((i64::from(x), i64::from(y))) {
                mask.cells[i] = true;
            }
        }
        Some(mask)
    }

    fn index(&self, (x, y): (i64, i64)) -> Option<usize> {
        let lx = x - self.min_x;
        let ly = y - self.min_y;
        if lx < 0 || ly < 0 || lx >= self.width || ly >= self.height {
            return None;
        }
        usize::try_from(ly * self.width + lx).ok()
    }

    fn contains(&self, p: (i64, i64)) -> bool {
        self.index(p).is_some_and(|i| self.cells[i])
    }

    /// Scan column-major so ties on `x` resolve to the smallest `y`.
    fn leftmost_topmost(&self) -> Option<(i64, i64)> {
        (0..self.width)
            .flat_map(|lx| (0..self.height).map(move |ly| (lx, ly)))
            .map(|(lx, ly)| (lx + self.min_x, ly + self.min_y))
            .find(|&p| self.contains(p))
    }
}
