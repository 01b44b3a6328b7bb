//! Creative Voice File container.
//!
//! A 26-byte header (signature, header size at offset 20, version and
//! checksum) is followed by typed blocks: a type byte, a 24-bit length and
//! the payload. Type 8 carries no samples of its own; it sets the rate and
//! codec for the sound block after it.

use std::io::Cursor;

use log::{debug, warn};
use serde::Serialize;

use super::adpcm::{decode_adpcm, AdpcmState, VocCodec};
use crate::binary_utils::{read_u16_le, read_u24_le, read_u32_le, read_u8, u16_at};
use crate::error::DecodeError;

pub const VOC_SIGNATURE: &[u8; 20] = b"Creative Voice File\x1A";
pub const VOC_HEADER_BYTES: usize = 26;
const HEADER_SIZE_OFFSET: usize = 20;
const BLOCK_HEADER_BYTES: usize = 4;

pub const SILENCE_SAMPLE: u8 = 128;

const TIME_CONSTANT_CLOCK: u32 = 1_000_000;
const EXTENDED_RATE_CLOCK: u64 = 256_000_000;
const NEW_FORMAT_PCM: u16 = 0x0000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundBlock {
    /// VOC block type this came from (1, 2 or 9).
    pub block_type: u8,
    pub sample_rate: u32,
    pub codec: u8,
    pub channels: u8,
    /// True when the first data byte seeds the ADPCM decoder.
    pub has_reference_byte: bool,
    #[serde(skip)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VocBlock {
    Terminator,
    Sound(SoundBlock),
    Silence { sample_rate: u32, samples: usize },
    Marker(u16),
    Text(String),
    /// `count` of 0xFFFF repeats forever.
    RepeatStart { count: u16 },
    RepeatEnd,
    Unsupported { block_type: u8, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u8,
    /// Unsigned 8-bit samples, interleaved when `channels > 1`.
    pub samples: Vec<u8>,
}

impl PcmBuffer {
    pub fn mono(sample_rate: u32, samples: Vec<u8>) -> Self {
        PcmBuffer {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct SoundParams {
    sample_rate: u32,
    codec: u8,
    channels: u8,
}

fn rate_from_time_constant(time_constant: u8) -> u32 {
    let divisor = 256 - time_constant as u32;
    (TIME_CONSTANT_CLOCK + divisor / 2) / divisor
}

fn rate_from_divisor(divisor: u16, channels: u8) -> u32 {
    let denominator = channels.max(1) as u64 * (65_536 - divisor as u64);
    ((EXTENDED_RATE_CLOCK + denominator / 2) / denominator) as u32
}

/// Splits a VOC file into typed blocks.
///
/// Unknown block types are skipped; a block whose payload runs past the end
/// of the buffer is cut short and ends the stream.
pub fn parse_voc(data: &[u8]) -> Result<Vec<VocBlock>, DecodeError> {
    if data.len() < VOC_HEADER_BYTES {
        return Err(DecodeError::truncated("VOC header", VOC_HEADER_BYTES, data.len()));
    }
    if &data[..VOC_SIGNATURE.len()] != VOC_SIGNATURE {
        return Err(DecodeError::InvalidData("missing Creative Voice File signature".to_string()));
    }

    let header_size = u16_at(data, HEADER_SIZE_OFFSET).unwrap_or_default() as usize;
    if header_size < VOC_HEADER_BYTES || header_size > data.len() {
        return Err(DecodeError::InvalidData(format!(
            "header size {} outside {}..={}",
            header_size,
            VOC_HEADER_BYTES,
            data.len()
        )));
    }

    let mut blocks = Vec::new();
    let mut pending: Option<SoundParams> = None;
    let mut last_sound: Option<SoundParams> = None;
    let mut pos = header_size;

    loop {
        let Some(&block_type) = data.get(pos) else {
            debug!("VOC stream ended without a terminator block");
            break;
        };
        if block_type == 0 {
            blocks.push(VocBlock::Terminator);
            break;
        }
        if pos + BLOCK_HEADER_BYTES > data.len() {
            warn!("VOC block header at {} is truncated", pos);
            break;
        }

        let mut cursor = Cursor::new(&data[pos + 1..pos + BLOCK_HEADER_BYTES]);
        let length = read_u24_le(&mut cursor)? as usize;
        let start = pos + BLOCK_HEADER_BYTES;
        let end = start + length;
        let truncated = end > data.len();
        if truncated {
            warn!(
                "VOC block type {} at {} wants {} bytes, {} available",
                block_type,
                pos,
                length,
                data.len() - start
            );
        }
        let payload = &data[start..end.min(data.len())];

        match parse_block(block_type, payload, &mut pending, &mut last_sound) {
            Ok(Some(block)) => blocks.push(block),
            Ok(None) => {}
            Err(e) => warn!("skipping VOC block type {} at {}: {}", block_type, pos, e),
        }

        if truncated {
            break;
        }
        pos = end;
    }

    Ok(blocks)
}

fn parse_block(
    block_type: u8,
    payload: &[u8],
    pending: &mut Option<SoundParams>,
    last_sound: &mut Option<SoundParams>,
) -> Result<Option<VocBlock>, DecodeError> {
    let mut cursor = Cursor::new(payload);

    let block = match block_type {
        1 => {
            let time_constant = read_u8(&mut cursor)?;
            let codec = read_u8(&mut cursor)?;
            let params = pending.take().unwrap_or(SoundParams {
                sample_rate: rate_from_time_constant(time_constant),
                codec,
                channels: 1,
            });
            *last_sound = Some(params);
            VocBlock::Sound(SoundBlock {
                block_type,
                sample_rate: params.sample_rate,
                codec: params.codec,
                channels: params.channels,
                has_reference_byte: params.codec != 0,
                data: payload[2..].to_vec(),
            })
        }
        2 => {
            let Some(params) = pending.take().or(*last_sound) else {
                return Ok(Some(VocBlock::Unsupported {
                    block_type,
                    reason: "continuation with no preceding sound parameters".to_string(),
                }));
            };
            *last_sound = Some(params);
            VocBlock::Sound(SoundBlock {
                block_type,
                sample_rate: params.sample_rate,
                codec: params.codec,
                channels: params.channels,
                has_reference_byte: false,
                data: payload.to_vec(),
            })
        }
        3 => {
            let length = read_u16_le(&mut cursor)?;
            let time_constant = read_u8(&mut cursor)?;
            VocBlock::Silence {
                sample_rate: rate_from_time_constant(time_constant),
                samples: length as usize + 1,
            }
        }
        4 => VocBlock::Marker(read_u16_le(&mut cursor)?),
        5 => {
            let text = payload.split(|&b| b == 0).next().unwrap_or_default();
            VocBlock::Text(String::from_utf8_lossy(text).into_owned())
        }
        6 => VocBlock::RepeatStart {
            count: read_u16_le(&mut cursor)?,
        },
        7 => VocBlock::RepeatEnd,
        8 => {
            let divisor = read_u16_le(&mut cursor)?;
            let codec = read_u8(&mut cursor)?;
            let channels = read_u8(&mut cursor)?.saturating_add(1);
            let params = SoundParams {
                sample_rate: rate_from_divisor(divisor, channels),
                codec,
                channels,
            };
            debug!(
                "VOC extra info: {} Hz, codec {}, {} channel(s)",
                params.sample_rate, params.codec, params.channels
            );
            *pending = Some(params);
            return Ok(None);
        }
        9 => {
            let sample_rate = read_u32_le(&mut cursor)?;
            let bits = read_u8(&mut cursor)?;
            let channels = read_u8(&mut cursor)?;
            let format = read_u16_le(&mut cursor)?;
            read_u32_le(&mut cursor)?;

            if bits != 8 || channels != 1 || format != NEW_FORMAT_PCM {
                return Ok(Some(VocBlock::Unsupported {
                    block_type,
                    reason: format!(
                        "{}-bit, {} channel(s), format {:#06x}",
                        bits, channels, format
                    ),
                }));
            }
            *last_sound = Some(SoundParams {
                sample_rate,
                codec: 0,
                channels,
            });
            VocBlock::Sound(SoundBlock {
                block_type,
                sample_rate,
                codec: 0,
                channels,
                has_reference_byte: false,
                data: payload[cursor.position() as usize..].to_vec(),
            })
        }
        other => {
            warn!("unknown VOC block type {}, skipping", other);
            return Ok(None);
        }
    };

    Ok(Some(block))
}

/// Decodes every sound and silence block of a VOC file to PCM, carrying one
/// ADPCM state through the whole stream.
pub fn decode_voc(data: &[u8]) -> Result<Vec<PcmBuffer>, DecodeError> {
    Ok(decode_blocks(&parse_voc(data)?))
}

pub fn decode_blocks(blocks: &[VocBlock]) -> Vec<PcmBuffer> {
    let mut state = AdpcmState::default();
    let mut out = Vec::new();

    for block in blocks {
        match block {
            VocBlock::Sound(sound) => {
                let Some(codec) = VocCodec::from_id(sound.codec) else {
                    warn!("unknown VOC codec {:#04x}, skipping block", sound.codec);
                    continue;
                };
                let (samples, next) =
                    decode_adpcm(&sound.data, codec, sound.has_reference_byte, state);
                state = next;
                out.push(PcmBuffer {
                    sample_rate: sound.sample_rate,
                    channels: sound.channels,
                    samples,
                });
            }
            VocBlock::Silence {
                sample_rate,
                samples,
            } => out.push(PcmBuffer::mono(*sample_rate, vec![SILENCE_SAMPLE; *samples])),
            VocBlock::Unsupported { block_type, reason } => {
                warn!("unsupported VOC block type {}: {}", block_type, reason);
            }
            VocBlock::RepeatStart { .. } | VocBlock::RepeatEnd => {
                debug!("VOC repeat markers are not expanded");
            }
            VocBlock::Terminator | VocBlock::Marker(_) | VocBlock::Text(_) => {}
        }
    }

    out
}

/// Joins neighbouring buffers that share a rate and channel count.
pub fn coalesce(buffers: Vec<PcmBuffer>) -> Vec<PcmBuffer> {
    let mut out: Vec<PcmBuffer> = Vec::new();
    for buffer in buffers {
        match out.last_mut() {
            Some(last)
                if last.sample_rate == buffer.sample_rate && last.channels == buffer.channels =>
            {
                last.samples.extend_from_slice(&buffer.samples);
            }
            _ => out.push(buffer),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voc_file(blocks: &[(u8, Vec<u8>)], terminate: bool) -> Vec<u8> {
        let mut out = VOC_SIGNATURE.to_vec();
        out.extend_from_slice(&(VOC_HEADER_BYTES as u16).to_le_bytes());
        out.extend_from_slice(&0x010Au16.to_le_bytes());
        out.extend_from_slice(&0x1129u16.to_le_bytes());
        for (block_type, payload) in blocks {
            out.push(*block_type);
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..3]);
            out.extend_from_slice(payload);
        }
        if terminate {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(parse_voc(&[0u8; 10]).unwrap_err().is_truncation());

        let mut data = voc_file(&[], true);
        data[0] = b'X';
        assert!(matches!(parse_voc(&data), Err(DecodeError::InvalidData(_))));

        let mut data = voc_file(&[], true);
        data[20] = 200;
        assert!(parse_voc(&data).is_err());
    }

    #[test]
    fn test_type1_pcm_block() {
        // Time constant 156 -> 1_000_000 / 100
        let data = voc_file(&[(1, vec![156, 0, 10, 20, 30])], true);
        let blocks = parse_voc(&data).unwrap();
        assert_eq!(blocks.len(), 2);
        let VocBlock::Sound(sound) = &blocks[0] else {
            panic!("expected sound block");
        };
        assert_eq!(sound.sample_rate, 10_000);
        assert!(!sound.has_reference_byte);
        assert_eq!(sound.data, vec![10, 20, 30]);
        assert_eq!(blocks[1], VocBlock::Terminator);

        let pcm = decode_voc(&data).unwrap();
        assert_eq!(pcm, vec![PcmBuffer::mono(10_000, vec![10, 20, 30])]);
    }

    #[test]
    fn test_rate_rounding() {
        // 1_000_000 / 90 = 11111.1
        assert_eq!(rate_from_time_constant(166), 11_111);
        // 256_000_000 / 11610 = 22049.96
        assert_eq!(rate_from_divisor((65_536u32 - 11_610) as u16, 1), 22_050);
    }

    #[test]
    fn test_extra_info_then_continuation() {
        let divisor = (65_536u32 - 11_610) as u16;
        let mut extra = divisor.to_le_bytes().to_vec();
        extra.extend_from_slice(&[0x01, 0x00]);

        let data = voc_file(&[(8, extra), (2, vec![0x17, 0x80])], true);
        let blocks = parse_voc(&data).unwrap();
        let VocBlock::Sound(sound) = &blocks[0] else {
            panic!("expected sound block");
        };
        assert_eq!(sound.sample_rate, 22_050);
        assert_eq!(sound.codec, 0x01);
        assert_eq!(sound.channels, 1);
        assert!(!sound.has_reference_byte);

        // No reset: the first byte is decoded, not emitted
        let pcm = decode_voc(&data).unwrap();
        assert_eq!(pcm.len(), 1);
        assert_eq!(pcm[0].sample_rate, 22_050);
        assert_eq!(pcm[0].samples, vec![129, 136, 135, 135]);
    }

    #[test]
    fn test_adpcm_state_spans_blocks() {
        let data = voc_file(&[(1, vec![156, 0x01, 0x80, 0x17]), (2, vec![0x80])], true);
        let pcm = decode_voc(&data).unwrap();
        assert_eq!(pcm[0].samples, vec![128, 129, 136]);
        assert_eq!(pcm[1].samples, vec![135, 135]);
        assert_eq!(pcm[1].sample_rate, 10_000);
        assert_eq!(coalesce(pcm)[0].samples, vec![128, 129, 136, 135, 135]);
    }

    #[test]
    fn test_silence_marker_text_repeat() {
        let data = voc_file(
            &[
                (3, vec![4, 0, 156]),
                (4, vec![7, 0]),
                (5, b"hello\0".to_vec()),
                (6, vec![0xFF, 0xFF]),
                (7, vec![]),
            ],
            true,
        );
        let blocks = parse_voc(&data).unwrap();
        assert_eq!(
            blocks,
            vec![
                VocBlock::Silence {
                    sample_rate: 10_000,
                    samples: 5
                },
                VocBlock::Marker(7),
                VocBlock::Text("hello".to_string()),
                VocBlock::RepeatStart { count: 0xFFFF },
                VocBlock::RepeatEnd,
                VocBlock::Terminator,
            ]
        );
        let pcm = decode_blocks(&blocks);
        assert_eq!(pcm, vec![PcmBuffer::mono(10_000, vec![SILENCE_SAMPLE; 5])]);
    }

    #[test]
    fn test_unknown_type_and_codec_are_skipped() {
        let data = voc_file(
            &[
                (0x42, vec![1, 2, 3]),
                (1, vec![156, 0x07, 1, 2]),
                (1, vec![156, 0, 9]),
            ],
            true,
        );
        let blocks = parse_voc(&data).unwrap();
        assert_eq!(blocks.len(), 3);
        let pcm = decode_voc(&data).unwrap();
        assert_eq!(pcm, vec![PcmBuffer::mono(10_000, vec![9])]);
    }

    #[test]
    fn test_new_format_block() {
        let mut pcm = 8_000u32.to_le_bytes().to_vec();
        pcm.extend_from_slice(&[8, 1, 0, 0, 0, 0, 0, 0, 5, 6]);
        let mut stereo = 8_000u32.to_le_bytes().to_vec();
        stereo.extend_from_slice(&[16, 2, 4, 0, 0, 0, 0, 0, 5, 6]);

        let blocks = parse_voc(&voc_file(&[(9, pcm), (9, stereo)], true)).unwrap();
        let VocBlock::Sound(sound) = &blocks[0] else {
            panic!("expected sound block");
        };
        assert_eq!((sound.sample_rate, sound.data.clone()), (8_000, vec![5, 6]));
        assert!(matches!(blocks[1], VocBlock::Unsupported { block_type: 9, .. }));
    }

    #[test]
    fn test_truncated_block_ends_stream() {
        let mut data = voc_file(&[(1, vec![156, 0, 1, 2, 3, 4])], false);
        data.truncate(data.len() - 2);
        let blocks = parse_voc(&data).unwrap();
        assert_eq!(blocks.len(), 1);
        let VocBlock::Sound(sound) = &blocks[0] else {
            panic!("expected sound block");
        };
        assert_eq!(sound.data, vec![1, 2]);
    }
}
