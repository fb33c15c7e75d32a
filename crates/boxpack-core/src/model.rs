use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
///
/// Edges are half-open: the rectangle covers columns `x..x + w` and rows `y..y + h`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// Returns true if `r` is fully inside `self`. Empty rects count only when their origin
    /// lies inside the half-open bounds.
    pub fn contains(&self, r: &Rect) -> bool {
        let (rx, ry) = (r.x as u64 + r.w as u64, r.y as u64 + r.h as u64);
        let (sx, sy) = (self.x as u64 + self.w as u64, self.y as u64 + self.h as u64);
        r.x >= self.x
            && r.y >= self.y
            && rx <= sx
            && ry <= sy
            && (!r.is_empty() || ((r.x as u64) < sx && (r.y as u64) < sy))
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.is_empty()
            || r.is_empty()
            || self.x >= r.x + r.w
            || r.x >= self.x + self.w
            || self.y >= r.y + r.h
            || r.y >= self.y + self.h)
    }
    /// Shrinks the rectangle by `border` pixels on every side.
    pub fn inset(&self, border: u32) -> Rect {
        let b2 = border.saturating_mul(2);
        Rect::new(
            self.x.saturating_add(border),
            self.y.saturating_add(border),
            self.w.saturating_sub(b2),
            self.h.saturating_sub(b2),
        )
    }
}

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// True if `self` fits inside `other` on both axes.
    pub fn fits_in(&self, other: Size) -> bool {
        self.w <= other.w && self.h <= other.h
    }
    /// Grows the size by `border` pixels on every side.
    pub fn padded(&self, border: u32) -> Size {
        let b2 = border.saturating_mul(2);
        Size::new(self.w.saturating_add(b2), self.h.saturating_add(b2))
    }
}

impl From<(u32, u32)> for Size {
    fn from((w, h): (u32, u32)) -> Self {
        Size::new(w, h)
    }
}

/// Identifier handed out for every successful insertion.
///
/// Ids grow monotonically for the lifetime of a packer and are never reused,
/// even after a reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PackId(pub u64);

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a node inside a packer's arena. Only meaningful for the packer that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Normalized texture-space range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct UvRange {
    pub min: f32,
    pub max: f32,
}

impl UvRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
    pub fn extent(&self) -> f32 {
        self.max - self.min
    }
}

/// A rectangle resident in a texture atlas, addressed by normalized UVs.
///
/// UVs span texel edges of the border-excluded interior:
/// `u = (x + border) / size .. (x + w - border) / size`, so `u.extent() * size == size.w`.
/// Older box-packer atlases computed the max as `(x + w - 1 - border) / size` from an
/// inclusive max corner, which lands one texel short; these ranges do not subtract it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AtlasItem {
    pub id: PackId,
    /// Size of the stored image (without border).
    pub size: Size,
    pub u: UvRange,
    pub v: UvRange,
}

/// Region of the backing image that was written and needs uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl UpdateRegion {
    /// Create an empty update region.
    pub fn empty() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }

    /// Check if this region is empty.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get the area of this region in pixels.
    pub fn area(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }
}

impl From<Rect> for UpdateRegion {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.w,
            height: r.h,
        }
    }
}

/// Statistics about the packing tree of one atlas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AtlasStats {
    /// Nodes reachable from the root (branches and leaves).
    pub num_nodes: usize,
    pub num_branches: usize,
    pub num_leaves: usize,
    /// Leaves holding a live id.
    pub num_occupied: usize,
    pub num_free: usize,
    /// Sum of occupied leaf areas (including border padding).
    pub used_area: u64,
    /// Atlas width * height.
    pub total_area: u64,
    /// used_area / total_area (0.0 to 1.0).
    pub occupancy: f64,
    /// Largest free leaf by area, if any.
    pub largest_free: Option<Size>,
}

impl AtlasStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Nodes: {} ({} branches, {} leaves), Occupied: {}, Free: {}, Occupancy: {:.2}%, Used Area: {} px², Total Area: {} px²",
            self.num_nodes,
            self.num_branches,
            self.num_leaves,
            self.num_occupied,
            self.num_free,
            self.occupancy * 100.0,
            self.used_area,
            self.total_area,
        )
    }

    /// Returns unoccupied space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_area.saturating_sub(self.used_area)
    }
}
