//! Glyph cache with a pool of atlas pages.
//!
//! The atlas never resets itself. This example opens a new page when `add_item` fails and
//! resets the whole pool once it reaches `MAX_PAGES`.
use boxpack_core::Result;
use boxpack_core::prelude::*;
use image::DynamicImage;
use std::collections::HashMap;

const MAX_PAGES: usize = 3;

struct GlyphCache {
    cfg: AtlasConfig,
    pages: Vec<TextureAtlas>,
    glyphs: HashMap<char, (usize, PackId)>,
}

impl GlyphCache {
    fn new(cfg: AtlasConfig) -> Result<Self> {
        Ok(Self {
            pages: vec![TextureAtlas::new(cfg.clone())?],
            cfg,
            glyphs: HashMap::new(),
        })
    }

    fn get(&mut self, ch: char, bitmap: &DynamicImage) -> Result<Option<(usize, AtlasItem)>> {
        if let Some(&(page, id)) = self.glyphs.get(&ch) {
            if let Some(item) = self.pages[page].get_item(id) {
                return Ok(Some((page, item)));
            }
        }
        for (page, atlas) in self.pages.iter_mut().enumerate() {
            if let Some(item) = atlas.add_item(bitmap) {
                self.glyphs.insert(ch, (page, item.id));
                return Ok(Some((page, item)));
            }
        }
        if self.pages.len() == MAX_PAGES {
            for atlas in &mut self.pages {
                atlas.reset();
            }
            self.pages.truncate(1);
            self.glyphs.clear();
        } else {
            self.pages.push(TextureAtlas::new(self.cfg.clone())?);
        }
        let page = self.pages.len() - 1;
        Ok(self.pages[page].add_item(bitmap).map(|item| {
            self.glyphs.insert(ch, (page, item.id));
            (page, item)
        }))
    }
}

fn main() -> Result<()> {
    let cfg = AtlasConfig::builder()
        .size(128)
        .pixel_type(PixelType::L8)
        .border(1)
        .build();
    let mut cache = GlyphCache::new(cfg)?;
    for (i, ch) in ('!'..='~').enumerate() {
        let bitmap = DynamicImage::new_luma8(10 + (i as u32 % 7), 16);
        match cache.get(ch, &bitmap)? {
            Some((page, item)) => println!(
                "{ch:?} page={page} id={} u=[{:.3}, {:.3}] v=[{:.3}, {:.3}]",
                item.id, item.u.min, item.u.max, item.v.min, item.v.max
            ),
            None => println!("{ch:?} does not fit an empty page"),
        }
    }
    for (i, atlas) in cache.pages.iter().enumerate() {
        println!("page {i}: {:.1}% used", atlas.percentage_used() * 100.0);
    }
    Ok(())
}
