//! Run-length coding of the auxiliary 2-bit stream that trails a
//! generation-2 map.
//!
//! The stream is a sequence of signed command bytes. A positive command N
//! repeats the following byte N times; a negative command copies the next
//! |N| bytes literally. Every byte produced carries four 2-bit values,
//! lowest bits first. Nothing marks the end of the stream; expansion stops
//! once the declared number of values has been produced.

use log::{debug, warn};

pub const VALUES_PER_BYTE: usize = 4;
const MAX_RUN: usize = i8::MAX as usize;
const MAX_LITERAL: usize = 128;
const MIN_RUN_WORTH_ENCODING: usize = 3;

struct AuxBitWriter {
    values: Vec<u8>,
    written: usize,
}

impl AuxBitWriter {
    fn new(count: usize) -> Self {
        AuxBitWriter {
            values: vec![0; count],
            written: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.written >= self.values.len()
    }

    fn push_byte(&mut self, byte: u8) {
        for shift in (0..8).step_by(2) {
            if self.is_full() {
                return;
            }
            self.values[self.written] = (byte >> shift) & 0b11;
            self.written += 1;
        }
    }
}

/// Expands `data` into exactly `value_count` 2-bit values.
///
/// Values the stream never reaches stay zero. A zero command is skipped.
pub fn expand_aux_bits(data: &[u8], value_count: usize) -> Vec<u8> {
    let mut out = AuxBitWriter::new(value_count);
    let mut cursor = 0;

    while !out.is_full() && cursor < data.len() {
        let command = data[cursor] as i8;
        cursor += 1;

        match command {
            0 => {
                debug!("zero RLE command at byte {}, skipping", cursor - 1);
            }
            n if n > 0 => {
                let Some(&value) = data.get(cursor) else {
                    warn!("RLE run at byte {} is missing its value byte", cursor - 1);
                    break;
                };
                cursor += 1;
                for _ in 0..n {
                    out.push_byte(value);
                }
            }
            n => {
                let count = n.unsigned_abs() as usize;
                let end = (cursor + count).min(data.len());
                if end - cursor < count {
                    warn!(
                        "RLE literal at byte {} wants {} bytes, {} available",
                        cursor - 1,
                        count,
                        end - cursor
                    );
                }
                for &byte in &data[cursor..end] {
                    out.push_byte(byte);
                }
                cursor = end;
            }
        }
    }

    if !out.is_full() {
        debug!(
            "RLE stream ended after {} of {} values, zero-filling",
            out.written,
            value_count
        );
    }

    out.values
}

/// Packs 2-bit values four to a byte, lowest bits first. A trailing partial
/// byte is zero-padded.
pub fn pack_aux_bits(values: &[u8]) -> Vec<u8> {
    values
        .chunks(VALUES_PER_BYTE)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, v)| acc | ((v & 0b11) << (i * 2)))
        })
        .collect()
}

/// Encodes 2-bit values in the format [`expand_aux_bits`] reads.
pub fn compress_aux_bits(values: &[u8]) -> Vec<u8> {
    let bytes = pack_aux_bits(values);
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let run = count_equal_consecutive(&bytes, i, MAX_RUN);
        if run >= MIN_RUN_WORTH_ENCODING {
            flush_literals(&mut out, &bytes[literal_start..i]);
            out.push(run as u8);
            out.push(bytes[i]);
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    flush_literals(&mut out, &bytes[literal_start..]);
    out
}

fn flush_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_LITERAL) {
        out.push((-(chunk.len() as i16)) as i8 as u8);
        out.extend_from_slice(chunk);
    }
}

fn count_equal_consecutive(bytes: &[u8], start: usize, limit: usize) -> usize {
    bytes[start..]
        .iter()
        .take(limit)
        .take_while(|&&b| b == bytes[start])
        .count()
}
