//! Shared types for the fresco effect pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand decoded images
/// to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An ordered sequence of points. Closed outlines repeat nothing: the
/// last point implicitly connects back to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A straight-alpha RGBA8 raster.
///
/// Samples are stored row-major as `R, G, B, A` with
/// `samples.len() == width * height * 4`. Every stage returns a fresh
/// buffer and never mutates its input.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBuffer`] if the sample count does
    /// not equal `width * height * 4`.
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Result<Self, PipelineError> {
        let expected = sample_len(width, height);
        if samples.len() != expected {
            return Err(PipelineError::InvalidBuffer {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// A buffer filled with a single color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let samples = rgba
            .iter()
            .copied()
            .cycle()
            .take(sample_len(width, height))
            .collect();
        Self {
            width,
            height,
            samples,
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
    /// Returns [`PipelineError::ImageDecode`] if the format is
    /// unrecognized or the data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba_image(image.to_rgba8()))
    }

    /// Take ownership of a decoded `RgbaImage`.
    #[must_use]
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            samples: image.into_raw(),
        }
    }

    /// Convert into an `RgbaImage` for encoding or resampling.
    #[must_use]
    pub fn into_rgba_image(self) -> RgbaImage {
        // Length is checked on construction, so `from_raw` cannot fail;
        // an empty image is the only sane fallback if it ever did.
        RgbaImage::from_raw(self.width, self.height, self.samples)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.samples.len() / 4
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA samples.
    #[must_use]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Consume the buffer and return its samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }

    /// The RGBA value at `(x, y)`, or `None` outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.samples.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// The RGBA value nearest to `(x, y)`, clamping coordinates into the
    /// buffer. Returns transparent black for an empty buffer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_clamped(&self, x: f64, y: f64) -> [u8; 4] {
        if self.is_empty() {
            return [0, 0, 0, 0];
        }
        let cx = x.clamp(0.0, f64::from(self.width - 1)) as u32;
        let cy = y.clamp(0.0, f64::from(self.height - 1)) as u32;
        self.pixel(cx, cy).unwrap_or([0, 0, 0, 0])
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples", &format_args!("[{} bytes]", self.samples.len()))
            .finish()
    }
}

fn sample_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Serde proxy: `(width, height, samples)`, validated on the way in.
#[derive(Deserialize)]
struct PixelBufferProxy(u32, u32, Vec<u8>);

impl Serialize for PixelBuffer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.width, self.height, &self.samples).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PixelBuffer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let PixelBufferProxy(width, height, samples) = PixelBufferProxy::deserialize(deserializer)?;
        Self::new(width, height, samples).map_err(serde::de::Error::custom)
    }
}

/// Painterly stylization applied after tonal adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtStyle {
    /// Pass-through.
    #[default]
    None,
    /// Flat-shaded polygons built from color-coherent regions.
    #[serde(alias = "cubism")]
    RegionMosaic,
    /// Dense field of small irregular brush dabs.
    #[serde(alias = "pointillism")]
    Stipple,
    /// Grid of rotated, clipped, bordered tiles on paper.
    #[serde(alias = "modern")]
    SegmentedCollage,
    /// Rotated, scaled copies composited with screen and multiply.
    #[serde(alias = "abstract")]
    LayeredBlend,
}

impl ArtStyle {
    /// Every style, in menu order.
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::RegionMosaic,
        Self::Stipple,
        Self::SegmentedCollage,
        Self::LayeredBlend,
    ];
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::RegionMosaic => f.write_str("region-mosaic"),
            Self::Stipple => f.write_str("stipple"),
            Self::SegmentedCollage => f.write_str("segmented-collage"),
            Self::LayeredBlend => f.write_str("layered-blend"),
        }
    }
}

/// Channel-separated halftone applied after stylization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterStyle {
    /// Pass-through.
    #[default]
    None,
    /// One disc per block and channel.
    Dots,
    /// Horizontal strokes of varying weight.
    LinesHorizontal,
    /// Vertical strokes of varying weight.
    LinesVertical,
}

impl fmt::Display for RasterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Dots => f.write_str("dots"),
            Self::LinesHorizontal => f.write_str("lines-horizontal"),
            Self::LinesVertical => f.write_str("lines-vertical"),
        }
    }
}

/// Granularity and randomness handed to a stylization or halftone
/// stage. Both are percentages in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectParams {
    /// Coarse (0) to fine (100) structure.
    pub granularity: u8,
    /// Orderly (0) to chaotic (100) placement and shading.
    pub randomness: u8,
}

impl EffectParams {
    /// Build a parameter pair, clamping both values into `[0, 100]`.
    #[must_use]
    pub fn new(granularity: u8, randomness: u8) -> Self {
        Self {
            granularity: granularity.min(100),
            randomness: randomness.min(100),
        }
    }

    /// Granularity as `f64` in `[0, 100]`.
    #[must_use]
    pub fn granularity(self) -> f64 {
        f64::from(self.granularity.min(100))
    }

    /// Randomness as `f64` in `[0, 100]`.
    #[must_use]
    pub fn randomness(self) -> f64 {
        f64::from(self.randomness.min(100))
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::new(
            FilterSettings::DEFAULT_GRANULARITY,
            FilterSettings::DEFAULT_RANDOMNESS,
        )
    }
}

/// The complete parameter set driving one render.
///
/// Tonal values live in `[-100, 100]`, granularity and randomness in
/// `[0, 100]`. Out-of-range values are clamped on deserialization and
/// again by each stage; they are never rejected. Missing fields fall
/// back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSettings {
    /// Brightness offset.
    #[serde(deserialize_with = "clamp_serde::signed")]
    pub brightness: i8,
    /// Contrast offset.
    #[serde(deserialize_with = "clamp_serde::signed")]
    pub contrast: i8,
    /// Saturation offset.
    #[serde(deserialize_with = "clamp_serde::signed")]
    pub saturation: i8,
    /// Multiplier applied to bright pixels.
    #[serde(deserialize_with = "clamp_serde::signed")]
    pub highlights: i8,
    /// Multiplier applied to dark pixels.
    #[serde(deserialize_with = "clamp_serde::signed")]
    pub shadows: i8,
    /// Stylization style.
    pub art_style: ArtStyle,
    /// Stylization granularity.
    #[serde(deserialize_with = "clamp_serde::percent")]
    pub art_granularity: u8,
    /// Stylization randomness.
    #[serde(deserialize_with = "clamp_serde::percent")]
    pub art_randomness: u8,
    /// Halftone style.
    pub raster_style: RasterStyle,
    /// Halftone granularity.
    #[serde(deserialize_with = "clamp_serde::percent")]
    pub raster_granularity: u8,
    /// Halftone randomness.
    #[serde(deserialize_with = "clamp_serde::percent")]
    pub raster_randomness: u8,
}

impl FilterSettings {
    /// Default granularity for both effect stages.
    pub const DEFAULT_GRANULARITY: u8 = 50;
    /// Default randomness for both effect stages.
    pub const DEFAULT_RANDOMNESS: u8 = 30;

    /// A copy with every field forced into its legal range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            brightness: self.brightness.clamp(-100, 100),
            contrast: self.contrast.clamp(-100, 100),
            saturation: self.saturation.clamp(-100, 100),
            highlights: self.highlights.clamp(-100, 100),
            shadows: self.shadows.clamp(-100, 100),
            art_granularity: self.art_granularity.min(100),
            art_randomness: self.art_randomness.min(100),
            raster_granularity: self.raster_granularity.min(100),
            raster_randomness: self.raster_randomness.min(100),
            ..self
        }
    }

    /// Parameters for the stylization stage.
    #[must_use]
    pub fn art_params(&self) -> EffectParams {
        EffectParams::new(self.art_granularity, self.art_randomness)
    }

    /// Parameters for the halftone stage.
    #[must_use]
    pub fn raster_params(&self) -> EffectParams {
        EffectParams::new(self.raster_granularity, self.raster_randomness)
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 0,
            saturation: 0,
            highlights: 0,
            shadows: 0,
            art_style: ArtStyle::None,
            art_granularity: Self::DEFAULT_GRANULARITY,
            art_randomness: Self::DEFAULT_RANDOMNESS,
            raster_style: RasterStyle::None,
            raster_granularity: Self::DEFAULT_GRANULARITY,
            raster_randomness: Self::DEFAULT_RANDOMNESS,
        }
    }
}

/// Lenient numeric deserializers: any JSON number is accepted, rounded,
/// and clamped into range.
mod clamp_serde {
    use serde::{Deserialize, Deserializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn signed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i8, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value.is_nan() {
            return Ok(0);
        }
        Ok(value.round().clamp(-100.0, 100.0) as i8)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value.is_nan() {
            return Ok(0);
        }
        Ok(value.round().clamp(0.0, 100.0) as u8)
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Raw samples do not match the declared dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    InvalidBuffer {
        /// `width * height * 4`.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A working surface could not be allocated.
    #[error("cannot allocate a {width}x{height} drawing surface")]
    SurfaceUnavailable {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pixel_buffer_rejects_wrong_length() {
        let result = PixelBuffer::new(2, 2, vec![0; 15]);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidBuffer {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn pixel_buffer_filled_and_pixel_lookup() {
        let buf = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(buf.samples().len(), 24);
        assert_eq!(buf.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.pixel_count(), 6);
    }

    #[test]
    fn sample_clamped_stays_inside() {
        let mut samples = vec![0; 16];
        samples[12..16].copy_from_slice(&[9, 9, 9, 255]);
        let buf = PixelBuffer::new(2, 2, samples).unwrap();
        assert_eq!(buf.sample_clamped(50.0, 50.0), [9, 9, 9, 255]);
        assert_eq!(buf.sample_clamped(-3.0, -3.0), [0, 0, 0, 0]);
    }

    #[test]
    fn rgba_image_conversion_keeps_samples() {
        let img = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 40]));
        let buf = PixelBuffer::from_rgba_image(img.clone());
        assert_eq!(buf.dimensions(), Dimensions { width: 4, height: 3 });
        assert_eq!(buf.into_rgba_image(), img);
    }

    #[test]
    fn decode_empty_input_returns_error() {
        assert!(matches!(
            PixelBuffer::decode(&[]),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn decode_corrupt_bytes_returns_image_decode_error() {
        assert!(matches!(
            PixelBuffer::decode(&[0xFF, 0xFE, 0x00, 0x01]),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_png() {
        let img = RgbaImage::from_pixel(5, 7, image::Rgba([200, 100, 50, 255]));
        let mut bytes = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();

        let buf = PixelBuffer::decode(&bytes).unwrap();
        assert_eq!(buf.width(), 5);
        assert_eq!(buf.height(), 7);
        assert_eq!(buf.pixel(4, 6), Some([200, 100, 50, 255]));
    }

    #[test]
    fn pixel_buffer_deserialize_validates_length() {
        let err = serde_json::from_str::<PixelBuffer>("[2, 2, [0, 0, 0]]");
        assert!(err.is_err());
        let ok: PixelBuffer = serde_json::from_str("[1, 1, [1, 2, 3, 4]]").unwrap();
        assert_eq!(ok.pixel(0, 0), Some([1, 2, 3, 4]));
    }

    #[test]
    fn filter_settings_defaults() {
        let s = FilterSettings::default();
        assert_eq!(s.brightness, 0);
        assert_eq!(s.art_style, ArtStyle::None);
        assert_eq!(s.art_granularity, 50);
        assert_eq!(s.art_randomness, 30);
        assert_eq!(s.raster_style, RasterStyle::None);
        assert_eq!(s.raster_granularity, 50);
        assert_eq!(s.raster_randomness, 30);
    }

    #[test]
    fn filter_settings_missing_fields_use_defaults() {
        let s: FilterSettings =
            serde_json::from_str(r#"{"brightness": 20, "artStyle": "stipple"}"#).unwrap();
        assert_eq!(s.brightness, 20);
        assert_eq!(s.art_style, ArtStyle::Stipple);
        assert_eq!(s.contrast, 0);
        assert_eq!(s.raster_granularity, 50);
    }

    #[test]
    fn filter_settings_out_of_range_numbers_clamp() {
        let s: FilterSettings = serde_json::from_str(
            r#"{"brightness": 250, "contrast": -400.7, "artGranularity": 180, "rasterRandomness": -5}"#,
        )
        .unwrap();
        assert_eq!(s.brightness, 100);
        assert_eq!(s.contrast, -100);
        assert_eq!(s.art_granularity, 100);
        assert_eq!(s.raster_randomness, 0);
    }

    #[test]
    fn legacy_style_names_are_accepted() {
        let s: FilterSettings = serde_json::from_str(
            r#"{"artStyle": "cubism", "rasterStyle": "lines-vertical"}"#,
        )
        .unwrap();
        assert_eq!(s.art_style, ArtStyle::RegionMosaic);
        assert_eq!(s.raster_style, RasterStyle::LinesVertical);
        for (name, style) in [
            ("pointillism", ArtStyle::Stipple),
            ("modern", ArtStyle::SegmentedCollage),
            ("abstract", ArtStyle::LayeredBlend),
        ] {
            let parsed: ArtStyle = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(parsed, style);
        }
    }

    #[test]
    fn clamped_limits_every_field() {
        let s = FilterSettings {
            brightness: 127,
            shadows: -128,
            art_randomness: 255,
            ..FilterSettings::default()
        }
        .clamped();
        assert_eq!(s.brightness, 100);
        assert_eq!(s.shadows, -100);
        assert_eq!(s.art_randomness, 100);
    }

    #[test]
    fn effect_params_clamp() {
        let p = EffectParams::new(200, 101);
        assert_eq!(p.granularity, 100);
        assert_eq!(p.randomness, 100);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::SurfaceUnavailable {
                width: 0,
                height: 3
            }
            .to_string(),
            "cannot allocate a 0x3 drawing surface",
        );
    }
}
