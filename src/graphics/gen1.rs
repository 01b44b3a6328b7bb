//! # Generation-1 tile banks
//!
//! Every graphics file of the first title starts with a 3-byte header
//! (tile count, width in bytes, height in rows) followed by 16x16 tiles.
//! Background and solid banks store 4-byte chunks; sprite banks carry a
//! leading mask byte per chunk. The header doesn't say which, so the chunk
//! size is inferred from the payload length.

use image::RgbaImage;

use super::palette::Palette;
use super::planar::{decode_tile16, ChunkLayout};
use crate::error::DecodeError;

pub const GEN1_HEADER_BYTES: usize = 3;

#[derive(Debug, Clone)]
pub struct Gen1TileBank<'a> {
    pub tile_count: usize,
    pub width_bytes: u8,
    pub height: u8,
    pub layout: ChunkLayout,
    tiles: &'a [u8],
}

impl<'a> Gen1TileBank<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, DecodeError> {
        if data.len() < GEN1_HEADER_BYTES {
            return Err(DecodeError::truncated(
                "generation-1 tile header",
                GEN1_HEADER_BYTES,
                data.len(),
            ));
        }

        let tile_count = data[0] as usize;
        let width_bytes = data[1];
        let height = data[2];
        let payload = &data[GEN1_HEADER_BYTES..];

        let layout = if payload.len() == tile_count * ChunkLayout::Masked.tile_bytes() {
            ChunkLayout::Masked
        } else if payload.len() == tile_count * ChunkLayout::Opaque.tile_bytes() {
            ChunkLayout::Opaque
        } else if payload.len() > tile_count * ChunkLayout::Masked.tile_bytes() {
            // Padded file; the mask plane is the more common reason for extra bytes
            ChunkLayout::Masked
        } else {
            return Err(DecodeError::truncated(
                "generation-1 tile bank",
                GEN1_HEADER_BYTES + tile_count * ChunkLayout::Opaque.tile_bytes(),
                data.len(),
            ));
        };

        Ok(Gen1TileBank {
            tile_count,
            width_bytes,
            height,
            layout,
            tiles: payload,
        })
    }

    pub fn tile(&self, index: usize, palette: &Palette) -> Option<RgbaImage> {
        if index >= self.tile_count {
            return None;
        }
        decode_tile16(self.tiles, index, self.layout, palette)
    }

    pub fn tiles(&self, palette: &Palette) -> Vec<Option<RgbaImage>> {
        (0..self.tile_count).map(|i| self.tile(i, palette)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(count: u8, layout: ChunkLayout) -> Vec<u8> {
        let mut data = vec![count, 2, 16];
        data.resize(GEN1_HEADER_BYTES + count as usize * layout.tile_bytes(), 0);
        data
    }

    #[test]
    fn test_layout_detected_from_length() {
        let masked = bank(3, ChunkLayout::Masked);
        let parsed = Gen1TileBank::from_bytes(&masked).unwrap();
        assert_eq!(parsed.layout, ChunkLayout::Masked);
        assert_eq!(parsed.tile_count, 3);
        assert_eq!(parsed.height, 16);

        let opaque = bank(5, ChunkLayout::Opaque);
        assert_eq!(
            Gen1TileBank::from_bytes(&opaque).unwrap().layout,
            ChunkLayout::Opaque
        );
    }

    #[test]
    fn test_short_bank_is_rejected() {
        let mut data = bank(4, ChunkLayout::Opaque);
        data.truncate(data.len() - 1);
        assert!(matches!(
            Gen1TileBank::from_bytes(&data),
            Err(DecodeError::TruncatedInput { .. })
        ));
        assert!(Gen1TileBank::from_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn test_tile_index_bounded_by_header() {
        let palette = Palette::ega_default();
        let data = bank(2, ChunkLayout::Opaque);
        let parsed = Gen1TileBank::from_bytes(&data).unwrap();
        assert!(parsed.tile(1, &palette).is_some());
        assert!(parsed.tile(2, &palette).is_none());
        assert_eq!(parsed.tiles(&palette).len(), 2);
    }
}
