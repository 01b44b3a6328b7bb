//! Decodes actor frames and builds metaframes, memoizing both.
//!
//! Caches sit behind mutexes and store `Arc`s, so a compositor can be shared
//! between threads. Decoding happens outside the lock; two threads racing on
//! the same key both decode and the second insert wins, which is harmless
//! because the results are identical.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use log::{debug, warn};

use super::actor_info::{ActorInfoTable, SpriteFrame};
use super::definition::{SpriteDefinition, SpriteDefinitions};
use crate::graphics::palette::Palette;
use crate::graphics::planar::{decode_masked_block, MAX_BLOCK_TILES, TILE_DIM};

type Cache<K> = Mutex<HashMap<K, Option<Arc<RgbaImage>>>>;

pub struct SpriteCompositor {
    actor_info: ActorInfoTable,
    sprite_data: Vec<u8>,
    palette: Palette,
    definitions: SpriteDefinitions,
    frames: Cache<(u16, usize)>,
    metaframes: Cache<u16>,
    cache_limit: Option<usize>,
}

impl SpriteCompositor {
    pub fn new(actor_info: ActorInfoTable, sprite_data: Vec<u8>, palette: Palette) -> Self {
        SpriteCompositor {
            actor_info,
            sprite_data,
            palette,
            definitions: SpriteDefinitions::default(),
            frames: Mutex::new(HashMap::new()),
            metaframes: Mutex::new(HashMap::new()),
            cache_limit: None,
        }
    }

    pub fn with_definitions(mut self, definitions: SpriteDefinitions) -> Self {
        self.definitions = definitions;
        self.clear_cache();
        self
    }

    /// Bounds each cache to `limit` entries. A full cache is emptied before
    /// the next insert.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = Some(limit.max(1));
        self
    }

    pub fn actor_info(&self) -> &ActorInfoTable {
        &self.actor_info
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Swaps the palette and drops every cached raster.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
        self.clear_cache();
    }

    pub fn clear_cache(&self) {
        lock(&self.frames).clear();
        lock(&self.metaframes).clear();
    }

    pub fn cached_frames(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn cached_metaframes(&self) -> usize {
        lock(&self.metaframes).len()
    }

    pub fn frame_info(&self, actor_id: u16, frame_index: usize) -> Option<&SpriteFrame> {
        self.actor_info.frame(actor_id, frame_index)
    }

    pub fn get_frame(&self, actor_id: u16, frame_index: usize) -> Option<Arc<RgbaImage>> {
        let key = (actor_id, frame_index);
        if let Some(hit) = lock(&self.frames).get(&key) {
            return hit.clone();
        }

        let decoded = self.decode_frame(actor_id, frame_index).map(Arc::new);
        self.store(&self.frames, key, decoded.clone());
        decoded
    }

    pub fn get_metaframe(&self, actor_id: u16) -> Option<Arc<RgbaImage>> {
        if let Some(hit) = lock(&self.metaframes).get(&actor_id) {
            return hit.clone();
        }

        let built = self.build_metaframe(actor_id);
        self.store(&self.metaframes, actor_id, built.clone());
        built
    }

    fn decode_frame(&self, actor_id: u16, frame_index: usize) -> Option<RgbaImage> {
        let frame = self.actor_info.frame(actor_id, frame_index)?;
        let start = frame.data_offset as usize;
        let Some(data) = self.sprite_data.get(start..) else {
            warn!(
                "actor {} frame {} data at {} is past the end of sprite data ({} bytes)",
                actor_id,
                frame_index,
                start,
                self.sprite_data.len()
            );
            return None;
        };

        let image = decode_masked_block(
            data,
            frame.width_tiles as u32,
            frame.height_tiles as u32,
            &self.palette,
        );
        if image.is_none() {
            debug!(
                "actor {} frame {} ({}x{} tiles) could not be decoded",
                actor_id, frame_index, frame.width_tiles, frame.height_tiles
            );
        }
        image
    }

    fn build_metaframe(&self, actor_id: u16) -> Option<Arc<RgbaImage>> {
        match self.definitions.get(actor_id) {
            None => self.get_frame(actor_id, 0),
            Some(&SpriteDefinition::Simple {
                frame,
                force_opaque,
            }) => {
                let image = self.get_frame(actor_id, frame)?;
                if force_opaque {
                    Some(Arc::new(make_opaque(&image)))
                } else {
                    Some(image)
                }
            }
            Some(SpriteDefinition::Composite {
                source_actor,
                layers,
            }) => {
                let source = source_actor.unwrap_or(actor_id);
                let images = layers
                    .iter()
                    .map(|layer| {
                        self.get_frame(source, layer.frame)
                            .map(|image| (image, layer.offset_x, layer.offset_y))
                    })
                    .collect::<Option<Vec<_>>>()?;
                compose_owned(&images).map(Arc::new)
            }
            Some(&SpriteDefinition::Crate {
                crate_actor,
                crate_frame,
                contents_frame,
            }) => {
                let crate_image = self.get_frame(crate_actor, crate_frame)?;
                let contents = self.get_frame(actor_id, contents_frame)?;
                let x = (crate_image.width() as i32 - contents.width() as i32) / 2;
                let y = (crate_image.height() as i32 - contents.height() as i32) / 2;
                compose_owned(&[(crate_image, 0, 0), (contents, x, y)]).map(Arc::new)
            }
        }
    }

    fn store<K: Eq + Hash>(&self, cache: &Cache<K>, key: K, value: Option<Arc<RgbaImage>>) {
        let mut map = lock(cache);
        if let Some(limit) = self.cache_limit {
            if map.len() >= limit {
                debug!("sprite cache reached {} entries, clearing", limit);
                map.clear();
            }
        }
        map.insert(key, value);
    }
}

fn lock<K>(cache: &Cache<K>) -> std::sync::MutexGuard<'_, HashMap<K, Option<Arc<RgbaImage>>>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn compose_owned(layers: &[(Arc<RgbaImage>, i32, i32)]) -> Option<RgbaImage> {
    let borrowed: Vec<(&RgbaImage, i32, i32)> = layers
        .iter()
        .map(|(image, x, y)| (image.as_ref(), *x, *y))
        .collect();
    compose_layers(&borrowed)
}

/// Largest canvas side a metaframe may span.
pub const MAX_METAFRAME_DIM: u32 = MAX_BLOCK_TILES * TILE_DIM * 4;

/// Draws `layers` in order onto a canvas just large enough for all of them.
///
/// Offsets may be negative; the canvas origin is the top-left of the union
/// of the layer rectangles. Returns `None` for an empty union or one wider
/// or taller than [`MAX_METAFRAME_DIM`].
pub fn compose_layers(layers: &[(&RgbaImage, i32, i32)]) -> Option<RgbaImage> {
    let min_x = layers.iter().map(|(_, x, _)| i64::from(*x)).min()?;
    let min_y = layers.iter().map(|(_, _, y)| i64::from(*y)).min()?;
    let max_x = layers
        .iter()
        .map(|(image, x, _)| i64::from(*x) + i64::from(image.width()))
        .max()?;
    let max_y = layers
        .iter()
        .map(|(image, _, y)| i64::from(*y) + i64::from(image.height()))
        .max()?;

    let width = u32::try_from(max_x - min_x).ok()?;
    let height = u32::try_from(max_y - min_y).ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    if width > MAX_METAFRAME_DIM || height > MAX_METAFRAME_DIM {
        warn!("metaframe of {}x{} exceeds canvas limit", width, height);
        return None;
    }

    let mut canvas = RgbaImage::new(width, height);
    for (image, x, y) in layers {
        // Both within 0..=MAX_METAFRAME_DIM after the check above
        let dx = (i64::from(*x) - min_x) as u32;
        let dy = (i64::from(*y) - min_y) as u32;
        blit_masked(&mut canvas, image, dx, dy);
    }
    Some(canvas)
}

/// Copies every pixel of `image` that isn't fully transparent. Masked
/// sprites only ever carry alpha 0 or 255, so no blending is needed.
fn blit_masked(canvas: &mut RgbaImage, image: &RgbaImage, x0: u32, y0: u32) {
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] != 0 {
            canvas.put_pixel(x0 + x, y0 + y, *pixel);
        }
    }
}

/// Copy of `image` with every pixel's alpha raised to 255.
pub fn make_opaque(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[3] = 255;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::planar::MASKED_TILE_BYTES;
    use crate::sprites::actor_info::tests::{actor_info_bytes, frame_record};
    use crate::sprites::definition::MetaframeLayer;
    use image::Rgba;

    /// One masked 8x8 tile; `mask` bits set are transparent.
    fn masked_tile(colour: u8, mask: u8) -> Vec<u8> {
        let plane = |bit: u8| if colour & bit != 0 { 0xFF } else { 0x00 };
        let mut out = Vec::with_capacity(MASKED_TILE_BYTES);
        for _ in 0..8 {
            out.extend_from_slice(&[mask, plane(1), plane(2), plane(4), plane(8)]);
        }
        out
    }

    /// Actor 0: frame 0 is 2x2 blue tiles, frame 1 is one red tile.
    /// Actor 1: one green tile, left half transparent.
    fn compositor() -> SpriteCompositor {
        let mut sprites = Vec::new();
        for _ in 0..4 {
            sprites.extend(masked_tile(1, 0));
        }
        sprites.extend(masked_tile(4, 0));
        sprites.extend(masked_tile(2, 0xF0));

        let info = actor_info_bytes(&[
            Some(vec![
                frame_record(2, 2, (0, 0), 0),
                frame_record(1, 1, (0, 0), 160),
            ]),
            Some(vec![frame_record(1, 1, (0, 0), 200)]),
            Some(vec![frame_record(1, 1, (0, 0), 100_000)]),
        ]);
        SpriteCompositor::new(ActorInfoTable::parse(&info).unwrap(), sprites, Palette::default())
    }

    const BLUE: Rgba<u8> = Rgba([0, 0, 170, 255]);
    const RED: Rgba<u8> = Rgba([170, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 170, 0, 255]);

    #[test]
    fn test_get_frame_decodes_and_memoizes() {
        let compositor = compositor();
        let frame = compositor.get_frame(0, 0).unwrap();
        assert_eq!(frame.dimensions(), (16, 16));
        assert_eq!(*frame.get_pixel(15, 15), BLUE);

        let again = compositor.get_frame(0, 0).unwrap();
        assert!(Arc::ptr_eq(&frame, &again));
        assert_eq!(compositor.cached_frames(), 1);

        // Misses are cached too
        assert!(compositor.get_frame(0, 9).is_none());
        assert!(compositor.get_frame(2, 0).is_none());
        assert_eq!(compositor.cached_frames(), 3);
    }

    #[test]
    fn test_metaframe_layers_use_union_bounds() {
        let mut defs = SpriteDefinitions::default();
        defs.insert(
            5,
            SpriteDefinition::Composite {
                source_actor: Some(0),
                layers: vec![
                    MetaframeLayer {
                        frame: 0,
                        offset_x: 0,
                        offset_y: 0,
                    },
                    MetaframeLayer {
                        frame: 1,
                        offset_x: -4,
                        offset_y: 8,
                    },
                ],
            },
        );
        let compositor = compositor().with_definitions(defs);

        let meta = compositor.get_metaframe(5).unwrap();
        assert_eq!(meta.dimensions(), (20, 16));
        // Second layer starts at (0, 8)
        assert_eq!(*meta.get_pixel(0, 8), RED);
        assert_eq!(*meta.get_pixel(7, 15), RED);
        // First layer shifted right by 4, untouched above the second layer
        assert_eq!(*meta.get_pixel(4, 0), BLUE);
        assert_eq!(*meta.get_pixel(19, 15), BLUE);
        assert_eq!(meta.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_metaframe_defaults_to_frame_zero() {
        let compositor = compositor();
        let meta = compositor.get_metaframe(0).unwrap();
        assert_eq!(*meta, *compositor.get_frame(0, 0).unwrap());
        assert!(compositor.get_metaframe(40).is_none());
    }

    #[test]
    fn test_force_opaque_lifts_alpha() {
        let mut defs = SpriteDefinitions::default();
        defs.insert(
            1,
            SpriteDefinition::Simple {
                frame: 0,
                force_opaque: true,
            },
        );
        let compositor = compositor().with_definitions(defs);

        let plain = compositor.get_frame(1, 0).unwrap();
        assert_eq!(plain.get_pixel(0, 0)[3], 0);
        assert_eq!(*plain.get_pixel(7, 0), GREEN);

        let meta = compositor.get_metaframe(1).unwrap();
        assert_eq!(meta.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_crate_centres_contents() {
        let mut defs = SpriteDefinitions::default();
        defs.insert(
            1,
            SpriteDefinition::Crate {
                crate_actor: 0,
                crate_frame: 0,
                contents_frame: 0,
            },
        );
        let compositor = compositor().with_definitions(defs);

        let meta = compositor.get_metaframe(1).unwrap();
        assert_eq!(meta.dimensions(), (16, 16));
        // Contents at (4, 4): transparent left half shows the crate
        assert_eq!(*meta.get_pixel(4, 4), BLUE);
        assert_eq!(*meta.get_pixel(11, 4), GREEN);
        assert_eq!(*meta.get_pixel(12, 4), BLUE);
    }

    #[test]
    fn test_missing_layer_fails_closed() {
        let mut defs = SpriteDefinitions::default();
        defs.insert(
            7,
            SpriteDefinition::Composite {
                source_actor: Some(0),
                layers: vec![MetaframeLayer {
                    frame: 12,
                    offset_x: 0,
                    offset_y: 0,
                }],
            },
        );
        let compositor = compositor().with_definitions(defs);
        assert!(compositor.get_metaframe(7).is_none());
    }

    #[test]
    fn test_palette_change_clears_cache() {
        let mut compositor = compositor();
        compositor.get_frame(0, 0);
        compositor.get_metaframe(0);
        assert_eq!(compositor.cached_metaframes(), 1);

        compositor.set_palette(Palette::from_colours(vec![crate::graphics::palette::Rgb::new(9, 9, 9); 16]));
        assert_eq!(compositor.cached_frames(), 0);
        assert_eq!(compositor.cached_metaframes(), 0);
        assert_eq!(*compositor.get_frame(0, 0).unwrap().get_pixel(0, 0), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_cache_limit_clears_when_full() {
        let compositor = compositor().with_cache_limit(2);
        compositor.get_frame(0, 0);
        compositor.get_frame(0, 1);
        assert_eq!(compositor.cached_frames(), 2);
        compositor.get_frame(1, 0);
        assert_eq!(compositor.cached_frames(), 1);
    }

    #[test]
    fn test_shared_between_threads() {
        let compositor = compositor();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    assert_eq!(compositor.get_frame(0, 1).unwrap().dimensions(), (8, 8));
                });
            }
        });
        assert_eq!(compositor.cached_frames(), 1);
    }

    #[test]
    fn test_compose_layers_empty() {
        assert!(compose_layers(&[]).is_none());
    }

    #[test]
    fn test_compose_layers_extreme_offsets() {
        let tile = RgbaImage::from_pixel(8, 8, BLUE);
        assert!(compose_layers(&[(&tile, i32::MAX - 2, 0)]).is_some());
        assert!(compose_layers(&[(&tile, i32::MIN, 0), (&tile, 100, 0)]).is_none());
        assert!(compose_layers(&[(&tile, 0, i32::MIN), (&tile, 0, i32::MAX)]).is_none());

        let wide = MAX_METAFRAME_DIM as i32;
        assert!(compose_layers(&[(&tile, 0, 0), (&tile, wide, 0)]).is_none());
        let edge = compose_layers(&[(&tile, 0, 0), (&tile, wide - 8, 0)]).unwrap();
        assert_eq!(edge.dimensions(), (MAX_METAFRAME_DIM, 8));
    }

    #[test]
    fn test_oversized_definition_offsets_fail_closed() {
        let defs = SpriteDefinitions::from_json(
            r#"{ "9": { "kind": "composite", "source_actor": 0,
                        "layers": [ { "frame": 0 }, { "frame": 1, "offset_x": 2147483647 } ] } }"#,
        )
        .unwrap();
        let compositor = compositor().with_definitions(defs);
        assert!(compositor.get_metaframe(9).is_none());
        assert!(compositor.get_metaframe(0).is_some());
    }
}
