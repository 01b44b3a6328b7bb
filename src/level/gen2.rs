//! Generation-2 level files.
//!
//! ```text
//! 0x00  u16      offset of the map payload
//! 0x02  char[13] CZONE (tileset) filename
//! 0x0F  char[13] backdrop filename
//! 0x1C  char[13] music filename
//! 0x29  u8       flags
//! 0x2A  u8       alternative backdrop number
//! 0x2D  u16      actor table length in words
//! 0x2F  actors   (u16 id, u16 x, u16 y) each
//!
//! payload:
//!       u16      map width
//!       u16[32750] cells
//!       u16      auxiliary stream length
//!       u8[]     RLE-coded auxiliary 2-bit values
//! ```

use log::warn;
use serde::Serialize;

use super::rle::expand_aux_bits;
use super::ActorPlacement;
use crate::binary_utils::{fixed_string_at, u16_at};
use crate::error::DecodeError;

pub const GEN2_CELL_COUNT: usize = 32_750;
pub const HEADER_NAME_BYTES: usize = 13;
pub const HEADER_CZONE_OFFSET: usize = 2;
pub const HEADER_BACKDROP_OFFSET: usize = 15;
pub const HEADER_MUSIC_OFFSET: usize = 28;
pub const HEADER_FLAGS_OFFSET: usize = 41;
pub const HEADER_ALT_BACKDROP_OFFSET: usize = 42;
pub const HEADER_ACTOR_WORDS_OFFSET: usize = 45;
pub const ACTOR_TABLE_OFFSET: usize = 47;
pub const ACTOR_ENTRY_BYTES: usize = 6;
const ACTOR_ENTRY_WORDS: usize = 3;

/// Width word + cells + auxiliary length word.
pub const PAYLOAD_FIXED_BYTES: usize = 2 + GEN2_CELL_COUNT * 2 + 2;

const EXTENDED_CELL_FLAG: u16 = 0x8000;
const EXTENDED_BG_MASK: u16 = 0x03FF;
const EXTENDED_FG_SHIFT: u16 = 10;
const EXTENDED_FG_MASK: u16 = 0x1F;
const EXTRA_SHIFT: u16 = 5;
const SIMPLE_FG_THRESHOLD: u16 = 8000;
const SIMPLE_BG_DIVISOR: u16 = 8;
const SIMPLE_FG_DIVISOR: u16 = 40;

/// A map cell: an optional solid (background) and masked (foreground) tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Gen2Cell {
    pub bg: Option<u16>,
    pub fg: Option<u16>,
}

impl Gen2Cell {
    /// `extra` is the cell's 2-bit value from the auxiliary stream.
    pub fn classify(raw: u16, extra: u8) -> Self {
        if raw & EXTENDED_CELL_FLAG != 0 {
            let fg_low = (raw >> EXTENDED_FG_SHIFT) & EXTENDED_FG_MASK;
            Gen2Cell {
                bg: Some(raw & EXTENDED_BG_MASK),
                fg: Some(fg_low + ((extra as u16 & 0b11) << EXTRA_SHIFT)),
            }
        } else if raw < SIMPLE_FG_THRESHOLD {
            Gen2Cell {
                bg: Some(raw / SIMPLE_BG_DIVISOR),
                fg: None,
            }
        } else {
            Gen2Cell {
                bg: None,
                fg: Some((raw - SIMPLE_FG_THRESHOLD) / SIMPLE_FG_DIVISOR),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gen2Level {
    pub czone_name: String,
    pub backdrop_name: String,
    pub music_name: String,
    pub flags: u8,
    pub alt_backdrop: u8,
    pub actors: Vec<ActorPlacement>,
    pub width: usize,
    /// Always `32750 / width`; the payload size is fixed regardless of width.
    pub height: usize,
    /// All 32,750 cells in storage order, including any tail past `width * height`.
    pub cells: Vec<Gen2Cell>,
}

impl Gen2Level {
    pub fn cell(&self, x: usize, y: usize) -> Option<Gen2Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    /// Cells of the visible grid, row by row.
    pub fn rows(&self) -> impl Iterator<Item = &[Gen2Cell]> {
        self.cells[..self.width * self.height].chunks(self.width)
    }
}

pub fn parse_gen2(data: &[u8]) -> Result<Gen2Level, DecodeError> {
    if data.len() < ACTOR_TABLE_OFFSET {
        return Err(DecodeError::truncated(
            "generation-2 level header",
            ACTOR_TABLE_OFFSET,
            data.len(),
        ));
    }

    let header_field = |offset| fixed_string_at(data, offset, HEADER_NAME_BYTES).unwrap_or_default();
    let data_offset = u16_at(data, 0).unwrap_or_default() as usize;
    let czone_name = header_field(HEADER_CZONE_OFFSET);
    let backdrop_name = header_field(HEADER_BACKDROP_OFFSET);
    let music_name = header_field(HEADER_MUSIC_OFFSET);
    let flags = data[HEADER_FLAGS_OFFSET];
    let alt_backdrop = data[HEADER_ALT_BACKDROP_OFFSET];
    let actor_words = u16_at(data, HEADER_ACTOR_WORDS_OFFSET).unwrap_or_default() as usize;

    let actors = read_actors(data, actor_words / ACTOR_ENTRY_WORDS, data_offset);

    let payload_end = data_offset + PAYLOAD_FIXED_BYTES;
    if data.len() < payload_end {
        return Err(DecodeError::truncated(
            "generation-2 map payload",
            payload_end,
            data.len(),
        ));
    }

    let width = u16_at(data, data_offset).unwrap_or_default() as usize;
    if width == 0 || width > GEN2_CELL_COUNT {
        return Err(DecodeError::InvalidData(format!(
            "map width {} outside 1..={}",
            width, GEN2_CELL_COUNT
        )));
    }
    let height = GEN2_CELL_COUNT / width;

    let cells_start = data_offset + 2;
    let aux_len_offset = cells_start + GEN2_CELL_COUNT * 2;
    let aux_len = u16_at(data, aux_len_offset).unwrap_or_default() as usize;
    let aux_start = aux_len_offset + 2;
    let aux_end = (aux_start + aux_len).min(data.len());
    if aux_end - aux_start < aux_len {
        warn!(
            "auxiliary stream declares {} bytes, only {} present",
            aux_len,
            aux_end - aux_start
        );
    }

    let extras = expand_aux_bits(&data[aux_start..aux_end], GEN2_CELL_COUNT);
    let cells = data[cells_start..aux_len_offset]
        .chunks_exact(2)
        .zip(extras)
        .map(|(raw, extra)| Gen2Cell::classify(u16::from_le_bytes([raw[0], raw[1]]), extra))
        .collect();

    Ok(Gen2Level {
        czone_name,
        backdrop_name,
        music_name,
        flags,
        alt_backdrop,
        actors,
        width,
        height,
        cells,
    })
}

fn read_actors(data: &[u8], entry_count: usize, data_offset: usize) -> Vec<ActorPlacement> {
    let mut actors = Vec::new();
    for i in 0..entry_count {
        let offset = ACTOR_TABLE_OFFSET + i * ACTOR_ENTRY_BYTES;
        let end = offset + ACTOR_ENTRY_BYTES;
        if end > data_offset || end > data.len() {
            warn!(
                "actor table truncated at entry {} of {} (offset {}, map data at {})",
                i, entry_count, offset, data_offset
            );
            break;
        }

        let (Some(id), Some(x), Some(y)) = (
            u16_at(data, offset),
            u16_at(data, offset + 2),
            u16_at(data, offset + 4),
        ) else {
            break;
        };
        if id == 0 {
            continue;
        }
        actors.push(ActorPlacement { id, x, y });
    }
    actors
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::level::rle::compress_aux_bits;

    pub(crate) struct LevelFixture {
        pub czone: &'static str,
        pub width: u16,
        pub actors: Vec<(u16, u16, u16)>,
        pub cells: Vec<(usize, u16)>,
        pub extras: Vec<(usize, u8)>,
    }

    impl LevelFixture {
        pub fn new(width: u16) -> Self {
            LevelFixture {
                czone: "CZONE1.MNI",
                width,
                actors: Vec::new(),
                cells: Vec::new(),
                extras: Vec::new(),
            }
        }

        pub fn to_bytes(&self) -> Vec<u8> {
            let actor_bytes = self.actors.len() * ACTOR_ENTRY_BYTES;
            let data_offset = ACTOR_TABLE_OFFSET + actor_bytes;

            let mut out = vec![0u8; data_offset];
            out[0..2].copy_from_slice(&(data_offset as u16).to_le_bytes());
            out[2..2 + self.czone.len()].copy_from_slice(self.czone.as_bytes());
            out[HEADER_BACKDROP_OFFSET..HEADER_BACKDROP_OFFSET + 9].copy_from_slice(b"DROP1.MNI");
            out[HEADER_MUSIC_OFFSET..HEADER_MUSIC_OFFSET + 9].copy_from_slice(b"SONG1.IMF");
            out[HEADER_FLAGS_OFFSET] = 0x21;
            let words = (self.actors.len() * 3) as u16;
            out[45..47].copy_from_slice(&words.to_le_bytes());
            for (i, (id, x, y)) in self.actors.iter().enumerate() {
                let o = ACTOR_TABLE_OFFSET + i * ACTOR_ENTRY_BYTES;
                out[o..o + 2].copy_from_slice(&id.to_le_bytes());
                out[o + 2..o + 4].copy_from_slice(&x.to_le_bytes());
                out[o + 4..o + 6].copy_from_slice(&y.to_le_bytes());
            }

            out.extend_from_slice(&self.width.to_le_bytes());
            let mut raw = vec![0u16; GEN2_CELL_COUNT];
            for &(i, v) in &self.cells {
                raw[i] = v;
            }
            for v in raw {
                out.extend_from_slice(&v.to_le_bytes());
            }

            let mut extras = vec![0u8; GEN2_CELL_COUNT];
            for &(i, v) in &self.extras {
                extras[i] = v;
            }
            let aux = compress_aux_bits(&extras);
            out.extend_from_slice(&(aux.len() as u16).to_le_bytes());
            out.extend_from_slice(&aux);
            out
        }
    }

    #[test]
    fn test_extended_cell_uses_extra_bits() {
        let raw = 0x8000 | 5 | (3 << 10);
        assert_eq!(
            Gen2Cell::classify(raw, 2),
            Gen2Cell {
                bg: Some(5),
                fg: Some(67)
            }
        );
    }

    #[test]
    fn test_simple_cells_split_at_threshold() {
        assert_eq!(
            Gen2Cell::classify(7992, 3),
            Gen2Cell {
                bg: Some(999),
                fg: None
            }
        );
        assert_eq!(
            Gen2Cell::classify(8000 + 40 * 12, 0),
            Gen2Cell {
                bg: None,
                fg: Some(12)
            }
        );
    }

    #[test]
    fn test_parse_header_and_grid() {
        let mut fixture = LevelFixture::new(100);
        fixture.actors = vec![(12, 3, 4), (0, 9, 9), (40, 10, 20)];
        fixture.cells = vec![(0, 16), (101, 0x8000 | 5 | (3 << 10))];
        fixture.extras = vec![(101, 2)];

        let level = parse_gen2(&fixture.to_bytes()).unwrap();
        assert_eq!(level.czone_name, "CZONE1.MNI");
        assert_eq!(level.backdrop_name, "DROP1.MNI");
        assert_eq!(level.music_name, "SONG1.IMF");
        assert_eq!(level.flags, 0x21);
        assert_eq!(level.width, 100);
        assert_eq!(level.height, 327);
        assert_eq!(level.cells.len(), GEN2_CELL_COUNT);
        assert_eq!(
            level.actors,
            vec![
                ActorPlacement { id: 12, x: 3, y: 4 },
                ActorPlacement {
                    id: 40,
                    x: 10,
                    y: 20
                }
            ]
        );
        assert_eq!(level.cell(0, 0).unwrap().bg, Some(2));
        assert_eq!(
            level.cell(1, 1).unwrap(),
            Gen2Cell {
                bg: Some(5),
                fg: Some(67)
            }
        );
        assert!(level.cell(100, 0).is_none());
        assert_eq!(level.rows().count(), 327);
    }

    #[test]
    fn test_actor_scan_stops_at_data_offset() {
        let mut fixture = LevelFixture::new(64);
        fixture.actors = vec![(5, 1, 1), (6, 2, 2)];
        let mut bytes = fixture.to_bytes();
        // Claim four entries; only two fit before the map payload
        bytes[45..47].copy_from_slice(&12u16.to_le_bytes());

        let level = parse_gen2(&bytes).unwrap();
        assert_eq!(level.actors.len(), 2);
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let bytes = LevelFixture::new(64).to_bytes();
        let payload_end = ACTOR_TABLE_OFFSET + PAYLOAD_FIXED_BYTES;
        let err = parse_gen2(&bytes[..payload_end - 1]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedInput { .. }));
        assert!(parse_gen2(&bytes[..10]).is_err());
    }

    #[test]
    fn test_truncated_aux_stream_zero_fills() {
        let mut fixture = LevelFixture::new(64);
        fixture.cells = vec![(32_749, 0x8000)];
        fixture.extras = vec![(32_749, 3)];
        let bytes = fixture.to_bytes();
        let payload_end = ACTOR_TABLE_OFFSET + PAYLOAD_FIXED_BYTES;

        let level = parse_gen2(&bytes[..payload_end]).unwrap();
        assert_eq!(level.cells[32_749].fg, Some(0));

        let full = parse_gen2(&bytes).unwrap();
        assert_eq!(full.cells[32_749].fg, Some(96));
    }

    #[test]
    fn test_zero_width_is_invalid() {
        let bytes = LevelFixture::new(0).to_bytes();
        assert!(matches!(parse_gen2(&bytes), Err(DecodeError::InvalidData(_))));
    }
}
