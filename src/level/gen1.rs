//! Generation-1 level files: a variable-length header followed by a fixed
//! 128x90 grid of little-endian words.

use log::debug;
use serde::Serialize;

use super::ActorPlacement;
use crate::error::DecodeError;

pub const GEN1_WIDTH: usize = 128;
pub const GEN1_HEIGHT: usize = 90;
pub const GEN1_CELL_COUNT: usize = GEN1_WIDTH * GEN1_HEIGHT;
pub const GEN1_MAP_BYTES: usize = GEN1_CELL_COUNT * 2;

/// Raw values at or above this are sprite IDs rather than tile offsets.
pub const SPRITE_THRESHOLD: u16 = 0x3000;
const TILE_OFFSET_DIVISOR: u16 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Gen1Cell {
    Tile(u16),
    Sprite(u16),
}

impl Gen1Cell {
    pub fn classify(raw: u16) -> Self {
        if raw >= SPRITE_THRESHOLD {
            Gen1Cell::Sprite(raw)
        } else {
            Gen1Cell::Tile(raw / TILE_OFFSET_DIVISOR)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gen1Level {
    /// Bytes preceding the grid, kept verbatim.
    pub header: Vec<u8>,
    pub cells: Vec<Gen1Cell>,
}

impl Gen1Level {
    pub fn width(&self) -> usize {
        GEN1_WIDTH
    }

    pub fn height(&self) -> usize {
        GEN1_HEIGHT
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<Gen1Cell> {
        if x >= GEN1_WIDTH || y >= GEN1_HEIGHT {
            return None;
        }
        self.cells.get(y * GEN1_WIDTH + x).copied()
    }

    /// Sprite cells, row by row, as actor placements in cell units.
    pub fn actors(&self) -> Vec<ActorPlacement> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| match *cell {
                Gen1Cell::Sprite(id) => Some(ActorPlacement {
                    id,
                    x: (i % GEN1_WIDTH) as u16,
                    y: (i / GEN1_WIDTH) as u16,
                }),
                Gen1Cell::Tile(_) => None,
            })
            .collect()
    }
}

pub fn parse_gen1(data: &[u8]) -> Result<Gen1Level, DecodeError> {
    if data.len() < GEN1_MAP_BYTES {
        return Err(DecodeError::truncated(
            "generation-1 map",
            GEN1_MAP_BYTES,
            data.len(),
        ));
    }

    let header_len = data.len() - GEN1_MAP_BYTES;
    debug!("generation-1 level: {} header bytes", header_len);

    let cells = data[header_len..]
        .chunks_exact(2)
        .map(|raw| Gen1Cell::classify(u16::from_le_bytes([raw[0], raw[1]])))
        .collect();

    Ok(Gen1Level {
        header: data[..header_len].to_vec(),
        cells,
    })
}
