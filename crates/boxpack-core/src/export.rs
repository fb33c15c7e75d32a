use crate::atlas::TextureAtlas;
use crate::error::Result;
use serde_json::{Value, json};

/// Serialize an atlas as `{ meta, items }`.
/// `frame` is the pixel rectangle of the stored image (border excluded); `u`/`v` are `[min, max]`.
pub fn to_json(atlas: &TextureAtlas) -> Value {
    let items = atlas
        .items()
        .iter()
        .filter_map(|item| {
            let r = atlas.item_rect(item.id)?;
            Some(json!({
                "id": item.id,
                "frame": {"x": r.x, "y": r.y, "w": r.w, "h": r.h},
                "size": {"w": item.size.w, "h": item.size.h},
                "u": [item.u.min, item.u.max],
                "v": [item.v.min, item.v.max],
            }))
        })
        .collect::<Vec<_>>();
    let cfg = atlas.config();
    json!({
        "meta": {
            "app": "boxpack",
            "version": env!("CARGO_PKG_VERSION"),
            "size": cfg.size,
            "pixelType": cfg.pixel_type.as_str(),
            "filter": cfg.filter.as_str(),
            "border": cfg.border,
            "reclaim": cfg.reclaim.as_str(),
            "percentageUsed": atlas.percentage_used(),
        },
        "items": items,
    })
}

/// Pretty-printed [`to_json`].
pub fn to_json_string(atlas: &TextureAtlas) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json(atlas))?)
}
