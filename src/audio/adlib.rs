//! AdLib sound effects and their conversion to IMF register streams.
//!
//! An effect is one instrument on one FM channel plus a list of notes, one
//! per 140 Hz tick. IMF music plays at 280 Hz, so every tick becomes a
//! delay of two IMF ticks.

use std::io::Cursor;

use log::warn;
use serde::Serialize;

use crate::binary_utils::{read_bytes, read_u16_le, read_u32_le, read_u8};
use crate::error::DecodeError;

pub const ADLIB_TICK_RATE: u32 = 140;
pub const IMF_TICK_RATE: u32 = 280;
const IMF_TICKS_PER_EFFECT_TICK: u16 = (IMF_TICK_RATE / ADLIB_TICK_RATE) as u16;

pub const INSTRUMENT_BYTES: usize = 16;
/// Length, priority, instrument and octave.
pub const EFFECT_HEADER_BYTES: usize = 4 + 2 + INSTRUMENT_BYTES + 1;

const KEY_ON: u8 = 0x20;
const REG_FREQ_LOW: u8 = 0xA0;
const REG_KEY_BLOCK: u8 = 0xB0;
const REG_FEEDBACK: u8 = 0xC0;

/// One register write followed by a delay, in IMF ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImfCommand {
    pub register: u8,
    pub value: u8,
    pub delay: u16,
}

impl ImfCommand {
    pub fn new(register: u8, value: u8, delay: u16) -> Self {
        ImfCommand {
            register,
            value,
            delay,
        }
    }
}

/// Two-operator instrument; `m` fields are the modulator, `c` the carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdlibInstrument {
    pub m_char: u8,
    pub c_char: u8,
    pub m_scale: u8,
    pub c_scale: u8,
    pub m_attack: u8,
    pub c_attack: u8,
    pub m_sustain: u8,
    pub c_sustain: u8,
    pub m_wave: u8,
    pub c_wave: u8,
    pub connection: u8,
    pub voice: u8,
    pub mode: u8,
}

impl AdlibInstrument {
    pub fn from_bytes(bytes: &[u8; INSTRUMENT_BYTES]) -> Self {
        AdlibInstrument {
            m_char: bytes[0],
            c_char: bytes[1],
            m_scale: bytes[2],
            c_scale: bytes[3],
            m_attack: bytes[4],
            c_attack: bytes[5],
            m_sustain: bytes[6],
            c_sustain: bytes[7],
            m_wave: bytes[8],
            c_wave: bytes[9],
            connection: bytes[10],
            voice: bytes[11],
            mode: bytes[12],
        }
    }

    /// Register writes loading this instrument into channel 0.
    pub fn register_writes(&self) -> Vec<ImfCommand> {
        [
            (0x20, self.m_char),
            (0x23, self.c_char),
            (0x40, self.m_scale),
            (0x43, self.c_scale),
            (0x60, self.m_attack),
            (0x63, self.c_attack),
            (0x80, self.m_sustain),
            (0x83, self.c_sustain),
            (0xE0, self.m_wave),
            (0xE3, self.c_wave),
            (REG_FEEDBACK, self.connection),
        ]
        .into_iter()
        .map(|(register, value)| ImfCommand::new(register, value, 0))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdlibEffect {
    pub priority: u16,
    pub instrument: AdlibInstrument,
    pub octave: u8,
    /// F-number low byte per tick; 0 is a rest.
    pub notes: Vec<u8>,
}

impl AdlibEffect {
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < EFFECT_HEADER_BYTES {
            return Err(DecodeError::truncated(
                "AdLib effect header",
                EFFECT_HEADER_BYTES,
                data.len(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let length = read_u32_le(&mut cursor)? as usize;
        let priority = read_u16_le(&mut cursor)?;
        let mut instrument_bytes = [0u8; INSTRUMENT_BYTES];
        instrument_bytes.copy_from_slice(&read_bytes(&mut cursor, INSTRUMENT_BYTES)?);
        let octave = read_u8(&mut cursor)?;

        let available = data.len() - EFFECT_HEADER_BYTES;
        if length > available {
            warn!(
                "AdLib effect declares {} notes, only {} present",
                length, available
            );
        }
        let notes = read_bytes(&mut cursor, length.min(available))?;

        Ok(AdlibEffect {
            priority,
            instrument: AdlibInstrument::from_bytes(&instrument_bytes),
            octave,
            notes,
        })
    }

    pub fn to_imf(&self) -> Vec<ImfCommand> {
        let mut commands = self.instrument.register_writes();
        let block = ((self.octave & 0x07) << 2) | KEY_ON;

        for &note in &self.notes {
            if note == 0 {
                commands.push(ImfCommand::new(REG_KEY_BLOCK, 0, IMF_TICKS_PER_EFFECT_TICK));
            } else {
                commands.push(ImfCommand::new(REG_FREQ_LOW, note, 0));
                commands.push(ImfCommand::new(REG_KEY_BLOCK, block, IMF_TICKS_PER_EFFECT_TICK));
            }
        }

        commands.push(ImfCommand::new(REG_KEY_BLOCK, 0, 0));
        commands
    }
}

pub fn convert_adlib_effect(data: &[u8]) -> Result<Vec<ImfCommand>, DecodeError> {
    Ok(AdlibEffect::from_bytes(data)?.to_imf())
}

/// Serialises commands as a headerless (type-0) IMF file.
pub fn to_imf_bytes(commands: &[ImfCommand]) -> Vec<u8> {
    let mut out = Vec::with_capacity(commands.len() * 4);
    for command in commands {
        out.push(command.register);
        out.push(command.value);
        out.extend_from_slice(&command.delay.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect_bytes(octave: u8, notes: &[u8]) -> Vec<u8> {
        let mut out = (notes.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&3u16.to_le_bytes());
        out.extend_from_slice(&[
            0x21, 0x31, 0x4F, 0x00, 0xF2, 0xD2, 0x52, 0x73, 0x00, 0x01, 0x06, 0, 0, 0, 0, 0,
        ]);
        out.push(octave);
        out.extend_from_slice(notes);
        out
    }

    #[test]
    fn test_instrument_writes_come_first() {
        let commands = convert_adlib_effect(&effect_bytes(4, &[])).unwrap();
        let registers: Vec<u8> = commands.iter().map(|c| c.register).collect();
        assert_eq!(
            registers,
            vec![0x20, 0x23, 0x40, 0x43, 0x60, 0x63, 0x80, 0x83, 0xE0, 0xE3, 0xC0, 0xB0]
        );
        assert_eq!(commands[0].value, 0x21);
        assert_eq!(commands[10].value, 0x06);
        assert!(commands.iter().all(|c| c.delay == 0));
    }

    #[test]
    fn test_notes_and_key_off() {
        let effect = AdlibEffect::from_bytes(&effect_bytes(5, &[0x81, 0, 0x44])).unwrap();
        assert_eq!(effect.priority, 3);
        let notes = &effect.to_imf()[11..];
        assert_eq!(
            notes,
            &[
                ImfCommand::new(0xA0, 0x81, 0),
                ImfCommand::new(0xB0, (5 << 2) | 0x20, 2),
                ImfCommand::new(0xB0, 0, 2),
                ImfCommand::new(0xA0, 0x44, 0),
                ImfCommand::new(0xB0, (5 << 2) | 0x20, 2),
                ImfCommand::new(0xB0, 0, 0),
            ]
        );

        // Total playing time is two IMF ticks per note
        let total: u32 = effect.to_imf().iter().map(|c| c.delay as u32).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_short_note_list_is_truncated() {
        let mut data = effect_bytes(1, &[1, 2, 3]);
        data.truncate(data.len() - 1);
        let effect = AdlibEffect::from_bytes(&data).unwrap();
        assert_eq!(effect.notes, vec![1, 2]);

        assert!(AdlibEffect::from_bytes(&data[..10]).unwrap_err().is_truncation());
    }

    #[test]
    fn test_imf_bytes() {
        let bytes = to_imf_bytes(&[ImfCommand::new(0xA0, 0x81, 0), ImfCommand::new(0xB0, 0x34, 258)]);
        assert_eq!(bytes, vec![0xA0, 0x81, 0, 0, 0xB0, 0x34, 0x02, 0x01]);
    }
}
