//! Actor frame geometry (the ACTRINFO table).
//!
//! The file opens with one u16 word offset per actor; the first offset is
//! also the table's length in words. Each actor's frames are consecutive
//! 16-byte records at its offset, and run until the next non-zero offset.

use log::warn;
use serde::Serialize;

use crate::binary_utils::{i16_at, u16_at, u32_at};
use crate::error::DecodeError;
use crate::graphics::planar::{MASKED_TILE_BYTES, TILE_DIM};

pub const FRAME_RECORD_BYTES: usize = 16;
const FRAME_RECORD_WORDS: usize = FRAME_RECORD_BYTES / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpriteFrame {
    pub draw_index: u16,
    pub hotspot_x: i16,
    pub hotspot_y: i16,
    pub height_tiles: u16,
    pub width_tiles: u16,
    /// Byte offset of the frame's first tile in the sprite data file.
    pub data_offset: u32,
}

impl SpriteFrame {
    fn read(data: &[u8], offset: usize) -> Option<Self> {
        Some(SpriteFrame {
            draw_index: u16_at(data, offset)?,
            hotspot_x: i16_at(data, offset + 2)?,
            hotspot_y: i16_at(data, offset + 4)?,
            height_tiles: u16_at(data, offset + 6)?,
            width_tiles: u16_at(data, offset + 8)?,
            data_offset: u32_at(data, offset + 10)?,
        })
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width_tiles as u32 * TILE_DIM,
            self.height_tiles as u32 * TILE_DIM,
        )
    }

    /// Bytes of masked tile data the frame occupies.
    pub fn byte_len(&self) -> usize {
        self.width_tiles as usize * self.height_tiles as usize * MASKED_TILE_BYTES
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActorInfoTable {
    actors: Vec<Vec<SpriteFrame>>,
}

impl ActorInfoTable {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let table_words = u16_at(data, 0)
            .ok_or_else(|| DecodeError::truncated("actor info table", 2, data.len()))?
            as usize;
        if table_words == 0 {
            return Err(DecodeError::InvalidData("actor info table is empty".to_string()));
        }
        if table_words * 2 > data.len() {
            return Err(DecodeError::truncated(
                "actor info table",
                table_words * 2,
                data.len(),
            ));
        }

        let offsets: Vec<usize> = (0..table_words)
            .map(|i| u16_at(data, i * 2).unwrap_or_default() as usize)
            .collect();
        let file_words = data.len() / 2;

        let actors = offsets
            .iter()
            .enumerate()
            .map(|(actor, &offset)| {
                if offset == 0 {
                    return Vec::new();
                }
                let next = offsets[actor + 1..]
                    .iter()
                    .copied()
                    .find(|&o| o != 0)
                    .unwrap_or(file_words);
                if next < offset {
                    warn!(
                        "actor {} frames at word {} run past next actor at word {}",
                        actor, offset, next
                    );
                    return Vec::new();
                }
                read_frames(data, actor, offset * 2, (next - offset) / FRAME_RECORD_WORDS)
            })
            .collect();

        Ok(ActorInfoTable { actors })
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn frames(&self, actor_id: u16) -> Option<&[SpriteFrame]> {
        self.actors.get(actor_id as usize).map(Vec::as_slice)
    }

    pub fn frame(&self, actor_id: u16, frame_index: usize) -> Option<&SpriteFrame> {
        self.frames(actor_id)?.get(frame_index)
    }

    /// IDs of actors that have at least one frame.
    pub fn actor_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.actors
            .iter()
            .enumerate()
            .filter(|(_, frames)| !frames.is_empty())
            .map(|(id, _)| id as u16)
    }
}

fn read_frames(data: &[u8], actor: usize, start: usize, count: usize) -> Vec<SpriteFrame> {
    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        let offset = start + i * FRAME_RECORD_BYTES;
        match SpriteFrame::read(data, offset) {
            Some(frame) => frames.push(frame),
            None => {
                warn!("actor {} frame {} record at {} is truncated", actor, i, offset);
                break;
            }
        }
    }
    frames
}
