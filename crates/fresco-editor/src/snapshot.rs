//! The editor state captured by one history entry.
//!
//! Snapshots are cheap to clone: the image sits behind an [`Arc`] and
//! every other field is a small value. They serialize to the camelCase
//! JSON layout the persistence port stores; deserialization is lenient
//! (missing fields take defaults, numbers are clamped into range).

use std::fmt;
use std::sync::Arc;

use fresco_pipeline::{FilterSettings, PixelBuffer};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Shared, immutable reference to a loaded image.
#[derive(Clone)]
pub struct ImageHandle(Arc<PixelBuffer>);

impl ImageHandle {
    /// Wrap a buffer.
    #[must_use]
    pub fn new(buffer: PixelBuffer) -> Self {
        Self(Arc::new(buffer))
    }

    /// The shared buffer.
    #[must_use]
    pub const fn buffer(&self) -> &Arc<PixelBuffer> {
        &self.0
    }

    /// Whether both handles point at the same allocation.
    #[must_use]
    pub fn same_image(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Arc<PixelBuffer>> for ImageHandle {
    fn from(buffer: Arc<PixelBuffer>) -> Self {
        Self(buffer)
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_image(other) || *self.0 == *other.0
    }
}

impl Eq for ImageHandle {}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImageHandle").field(&*self.0).finish()
    }
}

impl Serialize for ImageHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ImageHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PixelBuffer::deserialize(deserializer).map(Self::new)
    }
}

/// Crop aspect presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CropMode {
    /// No crop.
    #[default]
    None,
    /// 1:1.
    Square,
    /// 3:4.
    Portrait,
    /// 4:3.
    Landscape,
    /// 16:9.
    Widescreen,
    /// 9:16.
    Video,
    /// Unconstrained.
    Free,
}

impl CropMode {
    /// Width over height for constrained modes.
    #[must_use]
    pub fn aspect_ratio(self) -> Option<f64> {
        match self {
            Self::None | Self::Free => None,
            Self::Square => Some(1.0),
            Self::Portrait => Some(3.0 / 4.0),
            Self::Landscape => Some(4.0 / 3.0),
            Self::Widescreen => Some(16.0 / 9.0),
            Self::Video => Some(9.0 / 16.0),
        }
    }
}

/// Crop rectangle in percent of the image extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CropSettings {
    /// Aspect preset.
    pub mode: CropMode,
    /// Width over height, when constrained.
    pub aspect_ratio: Option<f64>,
    /// Left edge.
    #[serde(deserialize_with = "lenient::percent")]
    pub x: f64,
    /// Top edge.
    #[serde(deserialize_with = "lenient::percent")]
    pub y: f64,
    /// Width.
    #[serde(deserialize_with = "lenient::percent")]
    pub width: f64,
    /// Height.
    #[serde(deserialize_with = "lenient::percent")]
    pub height: f64,
}

impl CropSettings {
    /// Full-image crop with the aspect ratio of `mode`.
    #[must_use]
    pub fn for_mode(mode: CropMode) -> Self {
        Self {
            mode,
            aspect_ratio: mode.aspect_ratio(),
            ..Self::default()
        }
    }
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            mode: CropMode::None,
            aspect_ratio: None,
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }
}

/// Rotation presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    /// No rotation.
    #[default]
    #[serde(rename = "none")]
    None,
    /// 90 degrees.
    #[serde(rename = "90")]
    Quarter,
    /// 180 degrees.
    #[serde(rename = "180")]
    Half,
    /// 270 degrees.
    #[serde(rename = "270")]
    ThreeQuarter,
    /// Any angle in `[-180, 180]`.
    #[serde(rename = "free")]
    Free,
}

/// Rotation applied to the image.
///
/// Deserialized values pass through [`RotationSettings::new`], so preset
/// modes always carry their own angle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRotation")]
pub struct RotationSettings {
    /// Preset.
    pub mode: RotationMode,
    /// Angle in degrees.
    pub angle: f64,
}

/// Rotation as stored, before normalization.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawRotation {
    mode: RotationMode,
    angle: f64,
}

impl From<RawRotation> for RotationSettings {
    fn from(raw: RawRotation) -> Self {
        let angle = if raw.angle.is_nan() { 0.0 } else { raw.angle };
        Self::new(raw.mode, angle)
    }
}

impl RotationSettings {
    /// Build settings for `mode`. Preset modes imply their own angle;
    /// `Free` clamps `angle` into `[-180, 180]`.
    #[must_use]
    pub const fn new(mode: RotationMode, angle: f64) -> Self {
        let angle = match mode {
            RotationMode::None => 0.0,
            RotationMode::Quarter => 90.0,
            RotationMode::Half => 180.0,
            RotationMode::ThreeQuarter => 270.0,
            RotationMode::Free => angle.clamp(-180.0, 180.0),
        };
        Self { mode, angle }
    }
}

/// Descriptive metadata embedded on export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Copyright notice.
    pub copyright: String,
    /// Author.
    pub author: String,
    /// Keywords.
    pub keywords: Vec<String>,
    /// Creation date, `YYYY-MM-DD` when set.
    pub date_created: String,
    /// Location.
    pub location: String,
    /// Alternative text.
    pub alt_text: String,
}

/// Everything one history entry records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSnapshot {
    /// The loaded image, if any.
    #[serde(deserialize_with = "lenient::image")]
    pub image: Option<ImageHandle>,
    /// Effect parameters.
    pub filter_settings: FilterSettings,
    /// Crop rectangle.
    pub crop_settings: CropSettings,
    /// Rotation.
    pub rotation_settings: RotationSettings,
    /// Descriptive metadata.
    pub metadata: ImageMetadata,
}

/// Partial update of [`FilterSettings`]. `None` fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterPatch {
    /// Brightness.
    pub brightness: Option<i8>,
    /// Contrast.
    pub contrast: Option<i8>,
    /// Saturation.
    pub saturation: Option<i8>,
    /// Highlights.
    pub highlights: Option<i8>,
    /// Shadows.
    pub shadows: Option<i8>,
    /// Painterly style.
    pub art_style: Option<fresco_pipeline::ArtStyle>,
    /// Stylization granularity.
    pub art_granularity: Option<u8>,
    /// Stylization randomness.
    pub art_randomness: Option<u8>,
    /// Halftone style.
    pub raster_style: Option<fresco_pipeline::RasterStyle>,
    /// Halftone granularity.
    pub raster_granularity: Option<u8>,
    /// Halftone randomness.
    pub raster_randomness: Option<u8>,
}

impl FilterPatch {
    /// Overlay this patch on `base`, clamping the result.
    #[must_use]
    pub fn apply(self, base: FilterSettings) -> FilterSettings {
        FilterSettings {
            brightness: self.brightness.unwrap_or(base.brightness),
            contrast: self.contrast.unwrap_or(base.contrast),
            saturation: self.saturation.unwrap_or(base.saturation),
            highlights: self.highlights.unwrap_or(base.highlights),
            shadows: self.shadows.unwrap_or(base.shadows),
            art_style: self.art_style.unwrap_or(base.art_style),
            art_granularity: self.art_granularity.unwrap_or(base.art_granularity),
            art_randomness: self.art_randomness.unwrap_or(base.art_randomness),
            raster_style: self.raster_style.unwrap_or(base.raster_style),
            raster_granularity: self.raster_granularity.unwrap_or(base.raster_granularity),
            raster_randomness: self.raster_randomness.unwrap_or(base.raster_randomness),
        }
        .clamped()
    }
}

/// Partial update of [`ImageMetadata`]. `None` fields are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPatch {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Copyright notice.
    pub copyright: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Keywords, replacing the whole list.
    pub keywords: Option<Vec<String>>,
    /// Creation date.
    pub date_created: Option<String>,
    /// Location.
    pub location: Option<String>,
    /// Alternative text.
    pub alt_text: Option<String>,
}

impl MetadataPatch {
    /// Overlay this patch on `base`.
    #[must_use]
    pub fn apply(self, base: ImageMetadata) -> ImageMetadata {
        ImageMetadata {
            title: self.title.unwrap_or(base.title),
            description: self.description.unwrap_or(base.description),
            copyright: self.copyright.unwrap_or(base.copyright),
            author: self.author.unwrap_or(base.author),
            keywords: self.keywords.unwrap_or(base.keywords),
            date_created: self.date_created.unwrap_or(base.date_created),
            location: self.location.unwrap_or(base.location),
            alt_text: self.alt_text.unwrap_or(base.alt_text),
        }
    }
}

/// Lenient field deserializers.
mod lenient {
    use serde::{Deserialize, Deserializer};

    use super::ImageHandle;

    pub fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        })
    }

    /// An image that does not parse as a pixel buffer (for example an
    /// encoded data URL) is dropped rather than failing the snapshot.
    pub fn image<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ImageHandle>, D::Error> {
        let Some(value) = Option::<serde_json::Value>::deserialize(deserializer)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(image) => Ok(Some(image)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable persisted image");
                Ok(None)
            }
        }
    }
}
