//! Color-coherent region segmentation for the mosaic style.

use rand::Rng;

use crate::types::PixelBuffer;

/// Spacing of the flood-fill seed grid, in pixels.
pub const SEED_STRIDE: u32 = 5;

/// Below this many surviving regions merging is skipped.
pub const MERGE_MIN_REGIONS: usize = 5;

/// A connected patch of similar color.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Member pixel coordinates.
    pub pixels: Vec<(u32, u32)>,
    /// Mean RGB of the member pixels.
    pub color: [f64; 3],
    /// Fraction of the image covered, in `[0, 1]`.
    pub weight: f64,
}

impl Region {
    #[allow(clippy::cast_precision_loss)]
    fn absorb(&mut self, other: Self) {
        let a = self.pixels.len() as f64;
        let b = other.pixels.len() as f64;
        let total = a + b;
        if total > 0.0 {
            for (mine, theirs) in self.color.iter_mut().zip(other.color) {
                *mine = mine.mul_add(a, theirs * b) / total;
            }
        }
        self.weight += other.weight;
        self.pixels.extend(other.pixels);
    }
}

/// Euclidean RGB distance.
#[must_use]
pub fn color_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

/// Grow 4-connected regions from a seed grid.
///
/// Each unclaimed seed accepts neighbors whose color lies within
/// `threshold` of the seed color. Regions covering less than
/// `min_weight` of the image are dropped. The grid origin is jittered
/// by `rng` inside one stride.
#[allow(clippy::cast_precision_loss)]
pub fn segment<R: Rng + ?Sized>(
    buffer: &PixelBuffer,
    threshold: f64,
    min_weight: f64,
    rng: &mut R,
) -> Vec<Region> {
    if buffer.is_empty() {
        return Vec::new();
    }
    let (width, height) = (buffer.width(), buffer.height());
    let total = buffer.pixel_count() as f64;
    let jitter_span = SEED_STRIDE.min(width).min(height);
    let origin_x = rng.random_range(0..jitter_span);
    let origin_y = rng.random_range(0..jitter_span);

    let mut claimed = vec![false; buffer.pixel_count()];
    // Tracks the last seed attempt that examined each pixel, so a pixel
    // rejected by one region can still join a later one.
    let mut examined = vec![0u32; buffer.pixel_count()];
    let mut attempt = 0u32;
    let mut regions = Vec::new();

    for sy in (origin_y..height).step_by(SEED_STRIDE as usize) {
        for sx in (origin_x..width).step_by(SEED_STRIDE as usize) {
            let seed_index = index(width, sx, sy);
            if claimed[seed_index] {
                continue;
            }
            attempt += 1;
            let seed_color = rgb(buffer, sx, sy);

            let mut pixels = Vec::new();
            let mut sum = [0.0f64; 3];
            let mut stack = vec![(sx, sy)];
            examined[seed_index] = attempt;

            while let Some((x, y)) = stack.pop() {
                let color = rgb(buffer, x, y);
                if color_distance(color, seed_color) > threshold {
                    continue;
                }
                claimed[index(width, x, y)] = true;
                for (s, c) in sum.iter_mut().zip(color) {
                    *s += c;
                }
                pixels.push((x, y));

                for (nx, ny) in neighbors(x, y, width, height) {
                    let ni = index(width, nx, ny);
                    if !claimed[ni] && examined[ni] != attempt {
                        examined[ni] = attempt;
                        stack.push((nx, ny));
                    }
                }
            }

            let weight = pixels.len() as f64 / total;
            if pixels.is_empty() || weight < min_weight {
                continue;
            }
            let n = pixels.len() as f64;
            regions.push(Region {
                pixels,
                color: sum.map(|s| s / n),
                weight,
            });
        }
    }

    regions
}

/// Merge similar regions and keep the heaviest `max_regions`.
///
/// With fewer than [`MERGE_MIN_REGIONS`] inputs nothing is merged; the
/// regions are only sorted by descending weight. Otherwise regions whose
/// mean colors are closer than `threshold` are combined repeatedly until
/// no pair qualifies.
#[must_use]
pub fn merge(mut regions: Vec<Region>, threshold: f64, max_regions: usize) -> Vec<Region> {
    if regions.len() >= MERGE_MIN_REGIONS {
        loop {
            let before = regions.len();
            let mut merged: Vec<Region> = Vec::with_capacity(before);
            for region in regions {
                match merged
                    .iter_mut()
                    .find(|m| color_distance(m.color, region.color) < threshold)
                {
                    Some(target) => target.absorb(region),
                    None => merged.push(region),
                }
            }
            regions = merged;
            if regions.len() == before {
                break;
            }
        }
    }

    regions.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    if regions.len() >= MERGE_MIN_REGIONS {
        regions.truncate(max_regions);
    }
    regions
}

const fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

fn rgb(buffer: &PixelBuffer, x: u32, y: u32) -> [f64; 3] {
    let [r, g, b, _] = buffer.pixel(x, y).unwrap_or([0, 0, 0, 0]);
    [f64::from(r), f64::from(g), f64::from(b)]
}

fn neighbors(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let right = (x + 1 < width).then_some((x + 1, y));
    let up = y.checked_sub(1).map(|ny| (x, ny));
    let down = (y + 1 < height).then_some((x, y + 1));
    [left, right, up, down].into_iter().flatten()
}
