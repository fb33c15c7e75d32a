use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pixel layout of the atlas backing image.
/// Incoming images are converted to this layout before they are copied in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    /// 8-bit luminance (typical for glyph coverage masks).
    L8,
    /// 8-bit luminance + alpha.
    La8,
    Rgb8,
    Rgba8,
}

impl PixelType {
    pub fn color_type(self) -> image::ColorType {
        match self {
            PixelType::L8 => image::ColorType::L8,
            PixelType::La8 => image::ColorType::La8,
            PixelType::Rgb8 => image::ColorType::Rgb8,
            PixelType::Rgba8 => image::ColorType::Rgba8,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelType::L8 => 1,
            PixelType::La8 => 2,
            PixelType::Rgb8 => 3,
            PixelType::Rgba8 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelType::L8 => "l8",
            PixelType::La8 => "la8",
            PixelType::Rgb8 => "rgb8",
            PixelType::Rgba8 => "rgba8",
        }
    }
}

impl FromStr for PixelType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l8" | "l_u8" | "luma" => Ok(Self::L8),
            "la8" | "la_u8" => Ok(Self::La8),
            "rgb8" | "rgb_u8" => Ok(Self::Rgb8),
            "rgba8" | "rgba_u8" => Ok(Self::Rgba8),
            _ => Err(()),
        }
    }
}

/// Sampling filter the GPU texture should be created with.
/// Recorded for the texture component; packing does not depend on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::Nearest => "nearest",
            FilterMode::Linear => "linear",
        }
    }
}

impl FromStr for FilterMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "point" => Ok(Self::Nearest),
            "linear" | "bilinear" => Ok(Self::Linear),
            _ => Err(()),
        }
    }
}

/// What `insert` does when no free leaf can hold the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimPolicy {
    /// Fail the insertion. Timestamps are kept as metadata for caller-driven eviction.
    #[default]
    Never,
    /// Collapse the least recently stamped node that is large enough and insert there.
    LeastRecentlyUsed,
}

impl ReclaimPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReclaimPolicy::Never => "never",
            ReclaimPolicy::LeastRecentlyUsed => "lru",
        }
    }
}

impl FromStr for ReclaimPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" | "none" => Ok(Self::Never),
            "lru" | "least_recently_used" => Ok(Self::LeastRecentlyUsed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width and height of the square atlas in pixels.
    pub size: u32,
    #[serde(default = "default_pixel_type")]
    pub pixel_type: PixelType,
    #[serde(default = "default_filter")]
    pub filter: FilterMode,
    /// Pixels reserved around every item (prevents filter bleed between neighbors).
    #[serde(default)]
    pub border: u32,
    #[serde(default)]
    pub reclaim: ReclaimPolicy,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            size: 1024,
            pixel_type: default_pixel_type(),
            filter: default_filter(),
            border: 0,
            reclaim: ReclaimPolicy::Never,
        }
    }
}

impl AtlasConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - The atlas size is zero
    /// - The border would leave no room for even a 1x1 item
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BoxPackError;

        if self.size == 0 {
            return Err(BoxPackError::InvalidDimensions {
                width: self.size,
                height: self.size,
            });
        }

        let total_border = self.border.saturating_mul(2);
        if total_border >= self.size {
            return Err(BoxPackError::InvalidConfig(format!(
                "border ({}) * 2 leaves no usable space in a {}x{} atlas",
                self.border, self.size, self.size
            )));
        }

        Ok(())
    }

    /// Largest image (without border) a fresh atlas can accept.
    pub fn max_item_size(&self) -> u32 {
        self.size.saturating_sub(self.border.saturating_mul(2))
    }
}

fn default_pixel_type() -> PixelType {
    PixelType::Rgba8
}
fn default_filter() -> FilterMode {
    FilterMode::Linear
}

/// Builder for `AtlasConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct AtlasConfigBuilder {
    cfg: AtlasConfig,
}

impl AtlasConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: AtlasConfig::default(),
        }
    }
    pub fn size(mut self, v: u32) -> Self {
        self.cfg.size = v;
        self
    }
    pub fn pixel_type(mut self, v: PixelType) -> Self {
        self.cfg.pixel_type = v;
        self
    }
    pub fn filter(mut self, v: FilterMode) -> Self {
        self.cfg.filter = v;
        self
    }
    pub fn border(mut self, v: u32) -> Self {
        self.cfg.border = v;
        self
    }
    pub fn reclaim(mut self, v: ReclaimPolicy) -> Self {
        self.cfg.reclaim = v;
        self
    }
    pub fn build(self) -> AtlasConfig {
        self.cfg
    }
}

impl AtlasConfig {
    /// Create a fluent builder for `AtlasConfig`.
    pub fn builder() -> AtlasConfigBuilder {
        AtlasConfigBuilder::new()
    }
}
