//! Creative-style ADPCM as used inside VOC sound blocks.
//!
//! The three packed variants share one update rule and differ in how many
//! bits each encoded unit takes. Decoder state is an explicit value: every
//! call takes the state left by the previous block of the same stream and
//! returns the new one.

use serde::Serialize;

/// Codec ids stored in VOC sound-block headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VocCodec {
    /// 8-bit unsigned PCM.
    Pcm8,
    /// 4-bit ADPCM, two units per byte.
    Adpcm4,
    /// "2.6-bit" ADPCM, three units per byte.
    Adpcm3,
    /// 2-bit ADPCM, four units per byte.
    Adpcm2,
}

impl VocCodec {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(VocCodec::Pcm8),
            0x01 => Some(VocCodec::Adpcm4),
            0x02 => Some(VocCodec::Adpcm3),
            0x03 => Some(VocCodec::Adpcm2),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            VocCodec::Pcm8 => 0x00,
            VocCodec::Adpcm4 => 0x01,
            VocCodec::Adpcm3 => 0x02,
            VocCodec::Adpcm2 => 0x03,
        }
    }

    pub fn is_adpcm(self) -> bool {
        self != VocCodec::Pcm8
    }

    fn variant(self) -> Option<AdpcmVariant> {
        match self {
            VocCodec::Pcm8 => None,
            VocCodec::Adpcm4 => Some(AdpcmVariant {
                sign_bit: 0b1000,
                max_magnitude: 7,
                step_cap: 8,
            }),
            VocCodec::Adpcm3 => Some(AdpcmVariant {
                sign_bit: 0b100,
                max_magnitude: 3,
                step_cap: 16,
            }),
            VocCodec::Adpcm2 => Some(AdpcmVariant {
                sign_bit: 0b10,
                max_magnitude: 1,
                step_cap: 32,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdpcmVariant {
    sign_bit: u8,
    max_magnitude: u8,
    step_cap: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmState {
    pub reference: u8,
    pub step: u8,
}

impl Default for AdpcmState {
    fn default() -> Self {
        AdpcmState {
            reference: 128,
            step: 1,
        }
    }
}

impl AdpcmState {
    fn apply(&mut self, unit: u8, variant: AdpcmVariant) -> u8 {
        let magnitude = unit & (variant.sign_bit - 1);
        let negative = unit & variant.sign_bit != 0;

        // Minimum code at the minimum step: nothing moves
        if magnitude == 0 && self.step == 1 {
            return self.reference;
        }

        let step = self.step as i32;
        let delta = magnitude as i32 * step + step / 2;
        let next = if negative {
            self.reference as i32 - delta
        } else {
            self.reference as i32 + delta
        };
        self.reference = next.clamp(0, 255) as u8;

        if magnitude == 0 {
            self.step = (self.step / 2).max(1);
        } else if magnitude == variant.max_magnitude {
            self.step = self.step.saturating_mul(2).min(variant.step_cap);
        }

        self.reference
    }
}

fn units_of(byte: u8, codec: VocCodec) -> Vec<u8> {
    match codec {
        VocCodec::Pcm8 => Vec::new(),
        VocCodec::Adpcm4 => vec![byte >> 4, byte & 0x0F],
        // The third unit only has two stored bits; its low bit is always 0
        VocCodec::Adpcm3 => vec![byte >> 5, (byte >> 2) & 0x07, (byte & 0x03) << 1],
        VocCodec::Adpcm2 => vec![byte >> 6, (byte >> 4) & 0x03, (byte >> 2) & 0x03, byte & 0x03],
    }
}

/// Decodes one block of samples.
///
/// With `has_reference_byte` the first byte is output as-is and seeds the
/// state (step reset to 1); otherwise decoding continues from `state`.
/// PCM passes through and leaves the state alone.
pub fn decode_adpcm(
    data: &[u8],
    codec: VocCodec,
    has_reference_byte: bool,
    state: AdpcmState,
) -> (Vec<u8>, AdpcmState) {
    let Some(variant) = codec.variant() else {
        return (data.to_vec(), state);
    };

    let mut state = state;
    let mut samples = Vec::with_capacity(data.len() * 4 + 1);
    let mut body = data;

    if has_reference_byte {
        let Some((&reference, rest)) = data.split_first() else {
            return (samples, state);
        };
        samples.push(reference);
        state = AdpcmState { reference, step: 1 };
        body = rest;
    }

    for &byte in body {
        for unit in units_of(byte, codec) {
            samples.push(state.apply(unit, variant));
        }
    }

    (samples, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_ids() {
        for id in 0..4 {
            assert_eq!(VocCodec::from_id(id).map(VocCodec::id), Some(id));
        }
        assert_eq!(VocCodec::from_id(4), None);
        assert!(!VocCodec::Pcm8.is_adpcm());
    }

    #[test]
    fn test_4bit_with_reference_byte() {
        let (samples, state) = decode_adpcm(&[0x80, 0x17], VocCodec::Adpcm4, true, AdpcmState::default());
        assert_eq!(samples, vec![128, 129, 136]);
        assert_eq!(state, AdpcmState { reference: 136, step: 2 });
    }

    #[test]
    fn test_continuation_carries_state() {
        let (_, state) = decode_adpcm(&[0x80, 0x17], VocCodec::Adpcm4, true, AdpcmState::default());
        let (samples, state) = decode_adpcm(&[0x80], VocCodec::Adpcm4, false, state);
        assert_eq!(samples, vec![135, 135]);
        assert_eq!(state, AdpcmState { reference: 135, step: 1 });

        // Decoding the whole stream in one go gives the same samples
        let (joined, _) = decode_adpcm(&[0x80, 0x17, 0x80], VocCodec::Adpcm4, true, AdpcmState::default());
        assert_eq!(joined, vec![128, 129, 136, 135, 135]);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let data = [0x7F, 0x12, 0xA9, 0x3C, 0xF0, 0x08];
        let first = decode_adpcm(&data, VocCodec::Adpcm4, false, AdpcmState::default());
        let second = decode_adpcm(&data, VocCodec::Adpcm4, false, AdpcmState::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_4bit_clamps_and_caps_step() {
        let start = AdpcmState { reference: 250, step: 8 };
        let (samples, state) = decode_adpcm(&[0x70], VocCodec::Adpcm4, false, start);
        assert_eq!(samples, vec![255, 255]);
        assert_eq!(state.step, 4);

        let start = AdpcmState { reference: 3, step: 8 };
        let (samples, _) = decode_adpcm(&[0xF0], VocCodec::Adpcm4, false, start);
        assert_eq!(samples[0], 0);
    }

    #[test]
    fn test_3bit_unpacks_split_third_unit() {
        // 011 001 10 -> units 3, 1, 0b100
        let (samples, state) = decode_adpcm(&[0x66], VocCodec::Adpcm3, false, AdpcmState::default());
        assert_eq!(samples, vec![131, 134, 133]);
        assert_eq!(state.step, 1);
    }

    #[test]
    fn test_2bit_units_and_hold() {
        // 01 01 11 00
        let (samples, state) = decode_adpcm(&[0x5C], VocCodec::Adpcm2, false, AdpcmState::default());
        assert_eq!(samples, vec![129, 132, 126, 130]);
        assert_eq!(state, AdpcmState { reference: 130, step: 4 });

        let (samples, state) = decode_adpcm(&[0x00], VocCodec::Adpcm2, false, AdpcmState::default());
        assert_eq!(samples, vec![128; 4]);
        assert_eq!(state, AdpcmState::default());
    }

    #[test]
    fn test_pcm_passthrough_keeps_state() {
        let state = AdpcmState { reference: 40, step: 4 };
        let (samples, after) = decode_adpcm(&[1, 2, 3], VocCodec::Pcm8, true, state);
        assert_eq!(samples, vec![1, 2, 3]);
        assert_eq!(after, state);
    }

    #[test]
    fn test_empty_block_with_reference() {
        let state = AdpcmState { reference: 40, step: 4 };
        let (samples, after) = decode_adpcm(&[], VocCodec::Adpcm2, true, state);
        assert!(samples.is_empty());
        assert_eq!(after, state);
    }
}
