//! # CZONE tilesets
//!
//! A generation-2 level names its tileset ("CZONE") in the level header.
//! The file is a fixed 42,000 bytes:
//!
//! - 1000 u16 solid-tile attributes followed by 160 x 5 u16 masked-tile
//!   attributes (3600 bytes total),
//! - 1000 solid tiles, 32 bytes each,
//! - 160 masked tiles, 40 bytes each.

use image::RgbaImage;
use log::warn;

use super::palette::Palette;
use super::planar::{
    decode_tile, TileLayoutMode, CZONE_ATTRIBUTE_BYTES, CZONE_SOLID_TILES, MASKED_TILE_BYTES,
    SOLID_TILE_BYTES,
};
use crate::binary_utils::u16_at;
use crate::error::DecodeError;
use crate::level::Gen2Cell;

pub const CZONE_MASKED_TILES: usize = 160;
pub const CZONE_MASKED_ATTRIBUTE_WORDS: usize = 5;
pub const CZONE_MASKED_BASE: usize = CZONE_ATTRIBUTE_BYTES + CZONE_SOLID_TILES * SOLID_TILE_BYTES;
pub const CZONE_FILE_BYTES: usize = CZONE_MASKED_BASE + CZONE_MASKED_TILES * MASKED_TILE_BYTES;

pub struct CzoneTileset<'a> {
    data: &'a [u8],
    pub solid_attributes: Vec<u16>,
    pub masked_attributes: Vec<[u16; CZONE_MASKED_ATTRIBUTE_WORDS]>,
}

impl<'a> CzoneTileset<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, DecodeError> {
        if data.len() < CZONE_FILE_BYTES {
            return Err(DecodeError::truncated("CZONE tileset", CZONE_FILE_BYTES, data.len()));
        }
        if data.len() > CZONE_FILE_BYTES {
            warn!(
                "CZONE tileset has {} trailing bytes, ignoring",
                data.len() - CZONE_FILE_BYTES
            );
        }

        let solid_attributes = (0..CZONE_SOLID_TILES)
            .filter_map(|i| u16_at(data, i * 2))
            .collect();

        let masked_start = CZONE_SOLID_TILES * 2;
        let masked_attributes = (0..CZONE_MASKED_TILES)
            .map(|i| {
                let mut words = [0u16; CZONE_MASKED_ATTRIBUTE_WORDS];
                for (w, word) in words.iter_mut().enumerate() {
                    let offset = masked_start + (i * CZONE_MASKED_ATTRIBUTE_WORDS + w) * 2;
                    *word = u16_at(data, offset).unwrap_or_default();
                }
                words
            })
            .collect();

        Ok(CzoneTileset {
            data,
            solid_attributes,
            masked_attributes,
        })
    }

    pub fn solid_tile(&self, index: usize, palette: &Palette) -> Option<RgbaImage> {
        decode_tile(
            self.data,
            index,
            TileLayoutMode::SolidCzoneInterleaved,
            palette,
        )
    }

    pub fn masked_tile(&self, index: usize, palette: &Palette) -> Option<RgbaImage> {
        if index >= CZONE_MASKED_TILES {
            return None;
        }
        decode_tile(
            &self.data[CZONE_MASKED_BASE..],
            index,
            TileLayoutMode::Masked,
            palette,
        )
    }

    /// Decodes every tile once, solid tiles first.
    pub fn build_atlas(&self, palette: &Palette) -> TileAtlas {
        let solid = (0..CZONE_SOLID_TILES)
            .map(|i| self.solid_tile(i, palette))
            .collect();
        let masked = (0..CZONE_MASKED_TILES)
            .map(|i| self.masked_tile(i, palette))
            .collect();
        TileAtlas { solid, masked }
    }
}

/// Decoded CZONE tiles, indexed the way level cells reference them.
#[derive(Debug, Clone)]
pub struct TileAtlas {
    solid: Vec<Option<RgbaImage>>,
    masked: Vec<Option<RgbaImage>>,
}

impl TileAtlas {
    pub fn solid(&self, index: u16) -> Option<&RgbaImage> {
        self.solid.get(index as usize)?.as_ref()
    }

    pub fn masked(&self, index: u16) -> Option<&RgbaImage> {
        self.masked.get(index as usize)?.as_ref()
    }

    /// Background and foreground tiles for a level cell.
    pub fn resolve(&self, cell: Gen2Cell) -> (Option<&RgbaImage>, Option<&RgbaImage>) {
        (
            cell.bg.and_then(|bg| self.solid(bg)),
            cell.fg.and_then(|fg| self.masked(fg)),
        )
    }

    /// All tiles in atlas order (solid then masked); unavailable tiles are skipped.
    pub fn tiles(&self) -> impl Iterator<Item = &RgbaImage> {
        self.solid.iter().chain(self.masked.iter()).flatten()
    }

    pub fn len(&self) -> usize {
        self.solid.len() + self.masked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
