//! # Planar EGA tile decoding
//!
//! Every graphic in both titles is stored as EGA bit planes: one bit per
//! pixel per colour component, MSB first, so bit 7 of a plane byte is the
//! leftmost pixel. The colour index is `B*1 + G*2 + R*4 + I*8`.
//!
//! The layouts differ only in where each plane byte lives, which is what
//! [`TileLayoutMode`] selects. Decoding never reads outside the supplied
//! slice: a tile whose bytes would extend past the end is reported as
//! `None` ("tile unavailable").

use image::{imageops, RgbaImage};

use super::palette::{Palette, EGA_PALETTE_BYTES};

pub const TILE_DIM: u32 = 8;
pub const PLANE_COUNT: usize = 4;

pub const MASKED_TILE_BYTES: usize = 40; // 8 rows x (mask + 4 planes)
pub const SOLID_TILE_BYTES: usize = 32; // 8 rows x 4 planes

pub const GLOBAL_BANK_TILES: usize = 1000;
pub const GLOBAL_PLANE_STRIDE: usize = GLOBAL_BANK_TILES * 8;

/// Solid tiles in a CZONE file start after the attribute table.
pub const CZONE_ATTRIBUTE_BYTES: usize = 3600;
pub const CZONE_SOLID_TILES: usize = 1000;

pub const SCREEN_WIDTH: u32 = 320;
pub const SCREEN_HEIGHT: u32 = 200;
pub const SCREEN_ROW_BYTES: usize = (SCREEN_WIDTH / 8) as usize;
pub const SCREEN_PLANE_BYTES: usize = SCREEN_ROW_BYTES * SCREEN_HEIGHT as usize;
pub const SCREEN_BYTES: usize = SCREEN_PLANE_BYTES * PLANE_COUNT;
pub const SCREEN_WITH_PALETTE_BYTES: usize = SCREEN_BYTES + EGA_PALETTE_BYTES;

/// Largest sprite block (in 8px tiles) accepted from atlas metadata.
pub const MAX_BLOCK_TILES: u32 = 20;

pub const TILE16_DIM: u32 = 16;

/// Byte layout of a generation-2 graphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLayoutMode {
    /// 40 bytes per 8x8 tile: per scanline a mask byte (1 = transparent), then B, G, R, I.
    Masked,
    /// A 1000-tile bank with each plane stored whole: 8000 bytes per plane.
    SolidGlobal,
    /// 32 bytes per tile, per-scanline B, G, R, I, addressed inside a whole CZONE file.
    SolidCzoneInterleaved,
    /// 32 bytes per tile, per-scanline B, G, R, I, addressed from the start of the slice.
    SolidLocal,
    /// A single 320x200 image with four contiguous 8000-byte planes.
    FullScreenPlanar,
}

impl TileLayoutMode {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            TileLayoutMode::FullScreenPlanar => (SCREEN_WIDTH, SCREEN_HEIGHT),
            TileLayoutMode::Masked
            | TileLayoutMode::SolidGlobal
            | TileLayoutMode::SolidCzoneInterleaved
            | TileLayoutMode::SolidLocal => (TILE_DIM, TILE_DIM),
        }
    }

    pub fn has_mask(self) -> bool {
        matches!(self, TileLayoutMode::Masked)
    }

    /// Minimum buffer length needed to decode `tile_index`, or `None` if the
    /// index can never be valid for this mode.
    pub fn required_len(self, tile_index: usize) -> Option<usize> {
        match self {
            TileLayoutMode::Masked => tile_index
                .checked_add(1)?
                .checked_mul(MASKED_TILE_BYTES),
            TileLayoutMode::SolidLocal => tile_index.checked_add(1)?.checked_mul(SOLID_TILE_BYTES),
            TileLayoutMode::SolidCzoneInterleaved => {
                if tile_index >= CZONE_SOLID_TILES {
                    return None;
                }
                Some(CZONE_ATTRIBUTE_BYTES + (tile_index + 1) * SOLID_TILE_BYTES)
            }
            TileLayoutMode::SolidGlobal => {
                if tile_index >= GLOBAL_BANK_TILES {
                    return None;
                }
                // Last byte read is row 7 of the intensity plane
                Some((PLANE_COUNT - 1) * GLOBAL_PLANE_STRIDE + tile_index * 8 + 8)
            }
            TileLayoutMode::FullScreenPlanar => (tile_index == 0).then_some(SCREEN_BYTES),
        }
    }
}

/// How a mask plane's set bits are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskPolarity {
    /// Generation 2: a set bit is a see-through pixel.
    SetIsTransparent,
    /// Generation 1: a set bit is a drawn pixel.
    SetIsOpaque,
}

/// Collapses one byte from each of the B, G, R, I planes into 8 colour indices.
pub fn planar_row_indices(planes: [u8; PLANE_COUNT]) -> [u8; 8] {
    let mut indices = [0u8; 8];
    for (px, index) in indices.iter_mut().enumerate() {
        let shift = 7 - px;
        *index = planes
            .iter()
            .enumerate()
            .fold(0u8, |acc, (weight, plane)| {
                acc | (((plane >> shift) & 1) << weight)
            });
    }
    indices
}

fn put_row(
    image: &mut RgbaImage,
    x0: u32,
    y: u32,
    planes: [u8; PLANE_COUNT],
    mask: Option<(u8, MaskPolarity)>,
    palette: &Palette,
) {
    for (px, index) in planar_row_indices(planes).iter().enumerate() {
        let alpha = match mask {
            None => 255,
            Some((mask_byte, polarity)) => {
                let set = (mask_byte >> (7 - px)) & 1 == 1;
                let opaque = match polarity {
                    MaskPolarity::SetIsTransparent => !set,
                    MaskPolarity::SetIsOpaque => set,
                };
                if opaque {
                    255
                } else {
                    0
                }
            }
        };
        let colour = palette.colour(*index as usize).to_rgba(alpha);
        image.put_pixel(x0 + px as u32, y, colour);
    }
}

/// Decodes one tile of a generation-2 asset.
///
/// Returns `None` when the tile's bytes are not all inside `buffer`, or when
/// `tile_index` is outside the fixed bank a mode addresses.
pub fn decode_tile(
    buffer: &[u8],
    tile_index: usize,
    mode: TileLayoutMode,
    palette: &Palette,
) -> Option<RgbaImage> {
    let required = mode.required_len(tile_index)?;
    if buffer.len() < required {
        return None;
    }

    match mode {
        TileLayoutMode::Masked => decode_row_interleaved(
            &buffer[tile_index * MASKED_TILE_BYTES..required],
            Some(MaskPolarity::SetIsTransparent),
            palette,
        ),
        TileLayoutMode::SolidLocal | TileLayoutMode::SolidCzoneInterleaved => {
            decode_row_interleaved(&buffer[required - SOLID_TILE_BYTES..required], None, palette)
        }
        TileLayoutMode::SolidGlobal => Some(decode_plane_grouped(buffer, tile_index, palette)),
        TileLayoutMode::FullScreenPlanar => decode_full_screen(buffer, palette),
    }
}

/// `tile` is exactly one tile's bytes: 8 rows of `[mask,] B, G, R, I`.
fn decode_row_interleaved(
    tile: &[u8],
    mask: Option<MaskPolarity>,
    palette: &Palette,
) -> Option<RgbaImage> {
    let row_bytes = PLANE_COUNT + usize::from(mask.is_some());
    if tile.len() != row_bytes * TILE_DIM as usize {
        return None;
    }

    let mut image = RgbaImage::new(TILE_DIM, TILE_DIM);
    for (y, row) in tile.chunks_exact(row_bytes).enumerate() {
        let (row_mask, planes) = match mask {
            Some(polarity) => (Some((row[0], polarity)), &row[1..]),
            None => (None, row),
        };
        put_row(
            &mut image,
            0,
            y as u32,
            [planes[0], planes[1], planes[2], planes[3]],
            row_mask,
            palette,
        );
    }
    Some(image)
}

/// Caller has checked `buffer` reaches the end of the intensity plane row.
fn decode_plane_grouped(buffer: &[u8], tile_index: usize, palette: &Palette) -> RgbaImage {
    let mut image = RgbaImage::new(TILE_DIM, TILE_DIM);
    for y in 0..TILE_DIM as usize {
        let mut planes = [0u8; PLANE_COUNT];
        for (plane, byte) in planes.iter_mut().enumerate() {
            *byte = buffer[plane * GLOBAL_PLANE_STRIDE + tile_index * 8 + y];
        }
        put_row(&mut image, 0, y as u32, planes, None, palette);
    }
    image
}

/// Decodes a 320x200 planar screen. A 48-byte palette trailing the planes
/// takes precedence over `palette`.
pub fn decode_full_screen(buffer: &[u8], palette: &Palette) -> Option<RgbaImage> {
    if buffer.len() < SCREEN_BYTES {
        return None;
    }

    let local_palette;
    let palette = if buffer.len() >= SCREEN_WITH_PALETTE_BYTES {
        local_palette = Palette::from_fade_scale(&buffer[SCREEN_BYTES..SCREEN_WITH_PALETTE_BYTES]);
        &local_palette
    } else {
        palette
    };

    let mut image = RgbaImage::new(SCREEN_WIDTH, SCREEN_HEIGHT);
    for y in 0..SCREEN_HEIGHT as usize {
        for column in 0..SCREEN_ROW_BYTES {
            let offset = y * SCREEN_ROW_BYTES + column;
            let planes = [
                buffer[offset],
                buffer[SCREEN_PLANE_BYTES + offset],
                buffer[2 * SCREEN_PLANE_BYTES + offset],
                buffer[3 * SCREEN_PLANE_BYTES + offset],
            ];
            put_row(&mut image, column as u32 * 8, y as u32, planes, None, palette);
        }
    }
    Some(image)
}

/// Renders a backdrop bank: 1000 SolidLocal tiles laid out 40 wide by 25 high.
pub fn decode_backdrop(buffer: &[u8], palette: &Palette) -> Option<RgbaImage> {
    let tiles_wide = SCREEN_WIDTH / TILE_DIM;
    let tiles_high = SCREEN_HEIGHT / TILE_DIM;
    let mut image = RgbaImage::new(SCREEN_WIDTH, SCREEN_HEIGHT);

    for index in 0..(tiles_wide * tiles_high) {
        let tile = decode_tile(buffer, index as usize, TileLayoutMode::SolidLocal, palette)?;
        let x = (index % tiles_wide) * TILE_DIM;
        let y = (index / tiles_wide) * TILE_DIM;
        imageops::replace(&mut image, &tile, x as i64, y as i64);
    }
    Some(image)
}

/// Composes a `width_tiles` x `height_tiles` block of Masked tiles stored
/// row-major from the start of `buffer`.
///
/// Blocks larger than [`MAX_BLOCK_TILES`] either way are rejected, since the
/// dimensions come from metadata that may be corrupt.
pub fn decode_masked_block(
    buffer: &[u8],
    width_tiles: u32,
    height_tiles: u32,
    palette: &Palette,
) -> Option<RgbaImage> {
    if width_tiles == 0
        || height_tiles == 0
        || width_tiles > MAX_BLOCK_TILES
        || height_tiles > MAX_BLOCK_TILES
    {
        return None;
    }

    let tile_count = (width_tiles * height_tiles) as usize;
    if buffer.len() < tile_count * MASKED_TILE_BYTES {
        return None;
    }

    let mut image = RgbaImage::new(width_tiles * TILE_DIM, height_tiles * TILE_DIM);
    for index in 0..tile_count {
        let tile = decode_tile(buffer, index, TileLayoutMode::Masked, palette)?;
        let x = (index as u32 % width_tiles) * TILE_DIM;
        let y = (index as u32 / width_tiles) * TILE_DIM;
        imageops::replace(&mut image, &tile, x as i64, y as i64);
    }
    Some(image)
}

/// Chunk layout of a generation-1 16x16 tile. Each scanline is two 8-pixel
/// chunks side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkLayout {
    /// 4 bytes per chunk: B, G, R, I.
    Opaque,
    /// 5 bytes per chunk: mask (1 = drawn), B, G, R, I.
    ///
    /// Generation-1 banks store the mask inverted relative to generation 2:
    /// a set bit is a sprite pixel, a clear bit shows the background.
    Masked,
}

impl ChunkLayout {
    pub fn chunk_bytes(self) -> usize {
        match self {
            ChunkLayout::Opaque => PLANE_COUNT,
            ChunkLayout::Masked => PLANE_COUNT + 1,
        }
    }

    pub fn tile_bytes(self) -> usize {
        self.chunk_bytes() * 2 * TILE16_DIM as usize
    }
}

/// Decodes one 16x16 generation-1 tile from a headerless tile array.
pub fn decode_tile16(
    buffer: &[u8],
    tile_index: usize,
    layout: ChunkLayout,
    palette: &Palette,
) -> Option<RgbaImage> {
    let tile_bytes = layout.tile_bytes();
    let start = tile_index.checked_mul(tile_bytes)?;
    let tile = buffer.get(start..start.checked_add(tile_bytes)?)?;

    let chunk_bytes = layout.chunk_bytes();
    let mut image = RgbaImage::new(TILE16_DIM, TILE16_DIM);
    for (chunk_index, chunk) in tile.chunks_exact(chunk_bytes).enumerate() {
        let y = (chunk_index / 2) as u32;
        let x0 = (chunk_index % 2) as u32 * 8;
        let (mask, planes) = match layout {
            ChunkLayout::Masked => (Some((chunk[0], MaskPolarity::SetIsOpaque)), &chunk[1..]),
            ChunkLayout::Opaque => (None, chunk),
        };
        put_row(
            &mut image,
            x0,
            y,
            [planes[0], planes[1], planes[2], planes[3]],
            mask,
            palette,
        );
    }
    Some(image)
}
