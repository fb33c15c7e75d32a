//! Rectangle packing for glyph and image caches.
//!
//! - [`BoxPack`]: binary-tree bin packer with id lookup, explicit removal and optional
//!   least-recently-used reclamation
//! - [`TextureAtlas`]: one square texture on top of a `BoxPack`; pads items with a border,
//!   zero-fills their slots and hands back normalized UV ranges
//! - Data model is serde-serializable; [`to_json`] snapshots an atlas.
//!
//! Quick example:
//! ```ignore
//! use image::DynamicImage;
//! use boxpack_core::prelude::*;
//! # fn main() -> boxpack_core::Result<()> {
//! let cfg = AtlasConfig::builder().size(512).pixel_type(PixelType::L8).border(1).build();
//! let mut atlas = TextureAtlas::new(cfg)?;
//! let glyph = DynamicImage::new_luma8(12, 18);
//! match atlas.add_item(&glyph) {
//!     Some(item) => println!("{} at u={:?} v={:?}", item.id, item.u, item.v),
//!     None => println!("atlas full ({:.0}% used)", atlas.percentage_used() * 100.0),
//! }
//! # Ok(()) }
//! ```

pub mod atlas;
pub mod boxpack;
pub mod config;
pub mod error;
pub mod export;
pub mod model;

pub use atlas::*;
pub use boxpack::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;

/// Convenience prelude for common types and functions.
/// Importing `boxpack_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::atlas::TextureAtlas;
    pub use crate::boxpack::{BoxPack, PackNode};
    pub use crate::config::{AtlasConfig, AtlasConfigBuilder, FilterMode, PixelType, ReclaimPolicy};
    pub use crate::model::{
        AtlasItem, AtlasStats, NodeId, PackId, Rect, Size, UpdateRegion, UvRange,
    };
    pub use crate::{to_json, to_json_string};
}
