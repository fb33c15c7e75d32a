use crate::boxpack::BoxPack;
use crate::config::{AtlasConfig, FilterMode, PixelType};
use crate::error::Result;
use crate::model::{AtlasItem, AtlasStats, PackId, Rect, Size, UpdateRegion, UvRange};
use image::{DynamicImage, imageops};
use tracing::{debug, instrument, trace};

/// Texture atlas backed by a [`BoxPack`].
///
/// Keeps a CPU copy of the texture so every placement is zero-filled before the image is
/// copied in. Written regions are queued as [`UpdateRegion`]s for the GPU side to upload.
pub struct TextureAtlas {
    config: AtlasConfig,
    packer: BoxPack,
    texture: DynamicImage,
    updates: Vec<UpdateRegion>,
}

impl TextureAtlas {
    pub fn new(config: AtlasConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            size = config.size,
            pixel_type = config.pixel_type.as_str(),
            filter = config.filter.as_str(),
            border = config.border,
            "create texture atlas"
        );
        let packer = BoxPack::with_policy(
            Size::new(config.size, config.size),
            config.border,
            config.reclaim,
        );
        let texture = blank(config.size, config.size, config.pixel_type);
        Ok(Self {
            config,
            packer,
            texture,
            updates: Vec::new(),
        })
    }

    /// Shorthand for a square atlas with the default reclaim policy.
    pub fn with_size(
        size: u32,
        pixel_type: PixelType,
        filter: FilterMode,
        border: u32,
    ) -> Result<Self> {
        Self::new(AtlasConfig {
            size,
            pixel_type,
            filter,
            border,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn size(&self) -> u32 {
        self.config.size
    }

    pub fn pixel_type(&self) -> PixelType {
        self.config.pixel_type
    }

    pub fn filter(&self) -> FilterMode {
        self.config.filter
    }

    pub fn border(&self) -> u32 {
        self.config.border
    }

    /// CPU copy of the atlas texture.
    pub fn texture(&self) -> &DynamicImage {
        &self.texture
    }

    pub fn packer(&self) -> &BoxPack {
        &self.packer
    }

    /// Add an image, returning where it landed.
    ///
    /// `None` means the atlas has no room (or the image is empty); the caller decides
    /// whether to open another atlas, evict, or reset.
    pub fn add_item(&mut self, image: &DynamicImage) -> Option<AtlasItem> {
        let size = Size::new(image.width(), image.height());
        if size.is_empty() {
            debug!(w = size.w, h = size.h, "skip empty image");
            return None;
        }
        let border = self.config.border;
        let node = self.packer.insert(size.padded(border))?;
        let slot = self.packer.node(node);
        let (rect, id) = (slot.rect, slot.id?);

        zero_region(&mut self.texture, rect);
        blit(&mut self.texture, image, rect.x + border, rect.y + border);
        self.updates.push(rect.into());
        trace!(%id, ?rect, "item added");

        Some(self.to_item(id, rect))
    }

    /// Recompute the item for `id`, marking it as recently used.
    pub fn get_item(&mut self, id: PackId) -> Option<AtlasItem> {
        let rect = self.packer.get_node(id)?.rect;
        Some(self.to_item(id, rect))
    }

    /// Like [`get_item`](Self::get_item) but leaves the node's timestamp alone.
    pub fn peek_item(&self, id: PackId) -> Option<AtlasItem> {
        self.packer.peek(id).map(|n| self.to_item(id, n.rect))
    }

    /// All live items ordered by id.
    pub fn items(&self) -> Vec<AtlasItem> {
        let mut out: Vec<AtlasItem> = self
            .packer
            .nodes()
            .into_iter()
            .map(|n| self.packer.node(n))
            .filter_map(|node| node.id.map(|id| self.to_item(id, node.rect)))
            .collect();
        out.sort_by_key(|item| item.id);
        out
    }

    /// Pixel rectangle holding the image for `id` (border excluded).
    pub fn item_rect(&self, id: PackId) -> Option<Rect> {
        self.packer.find(id).map(|n| self.packer.interior(n))
    }

    /// Fraction of the atlas area held by live items, border padding included.
    pub fn percentage_used(&self) -> f32 {
        let total = self.packer.size().area();
        if total == 0 {
            return 0.0;
        }
        (self.packer.occupied_area() as f64 / total as f64) as f32
    }

    /// Evict `id`. With `clear` the freed texels are zeroed and the region is returned
    /// for upload; otherwise an empty region is returned.
    pub fn remove_item(&mut self, id: PackId, clear: bool) -> Option<UpdateRegion> {
        let rect = self.packer.remove(id)?;
        if !clear {
            return Some(UpdateRegion::empty());
        }
        zero_region(&mut self.texture, rect);
        let region = UpdateRegion::from(rect);
        self.updates.push(region);
        Some(region)
    }

    /// Forget every item and zero the whole texture.
    #[instrument(skip_all)]
    pub fn reset(&mut self) {
        self.packer.reset();
        self.texture = blank(self.config.size, self.config.size, self.config.pixel_type);
        self.updates.clear();
        self.updates.push(UpdateRegion {
            x: 0,
            y: 0,
            width: self.config.size,
            height: self.config.size,
        });
        debug!(size = self.config.size, "atlas reset");
    }

    /// Drain the regions written since the last call.
    pub fn take_updates(&mut self) -> Vec<UpdateRegion> {
        std::mem::take(&mut self.updates)
    }

    pub fn stats(&self) -> AtlasStats {
        self.packer.stats()
    }

    fn to_item(&self, id: PackId, rect: Rect) -> AtlasItem {
        let s = self.config.size as f32;
        let inner = rect.inset(self.config.border);
        AtlasItem {
            id,
            size: inner.size(),
            u: UvRange::new(inner.x as f32 / s, (inner.x + inner.w) as f32 / s),
            v: UvRange::new(inner.y as f32 / s, (inner.y + inner.h) as f32 / s),
        }
    }
}

fn blank(w: u32, h: u32, pixel_type: PixelType) -> DynamicImage {
    DynamicImage::new(w, h, pixel_type.color_type())
}

fn zero_region(texture: &mut DynamicImage, rect: Rect) {
    let zero = DynamicImage::new(rect.w, rect.h, texture.color());
    blit(texture, &zero, rect.x, rect.y);
}

// Converts `src` to the texture's layout before copying.
fn blit(texture: &mut DynamicImage, src: &DynamicImage, x: u32, y: u32) {
    let (x, y) = (x as i64, y as i64);
    match texture {
        DynamicImage::ImageLuma8(t) => imageops::replace(t, &src.to_luma8(), x, y),
        DynamicImage::ImageLumaA8(t) => imageops::replace(t, &src.to_luma_alpha8(), x, y),
        DynamicImage::ImageRgb8(t) => imageops::replace(t, &src.to_rgb8(), x, y),
        DynamicImage::ImageRgba8(t) => imageops::replace(t, &src.to_rgba8(), x, y),
        other => imageops::replace(other, src, x, y),
    }
}
