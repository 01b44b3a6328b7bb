//! # Palettes
//!
//! Two on-disk encodings exist. 16-colour palettes (48 bytes, also found
//! trailing full-screen images) use a 0-68 "fade" scale. 256-colour palettes
//! (768 bytes, or the first 768 bytes of a 64,768-byte file) use the VGA DAC
//! 6-bit scale with the top two bits masked off.

use image::Rgba;

use crate::error::DecodeError;

pub const EGA_PALETTE_BYTES: usize = 16 * 3;
pub const VGA_PALETTE_BYTES: usize = 256 * 3;
/// VGA palette followed by a 64000-byte 320x200 screen.
pub const VGA_PALETTE_WITH_SCREEN_BYTES: usize = VGA_PALETTE_BYTES + 64_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_rgba(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Standard 16-colour EGA palette, used when a title ships no palette file.
const EGA_DEFAULT: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0x00, 0x00, 0xAA),
    Rgb::new(0x00, 0xAA, 0x00),
    Rgb::new(0x00, 0xAA, 0xAA),
    Rgb::new(0xAA, 0x00, 0x00),
    Rgb::new(0xAA, 0x00, 0xAA),
    Rgb::new(0xAA, 0x55, 0x00),
    Rgb::new(0xAA, 0xAA, 0xAA),
    Rgb::new(0x55, 0x55, 0x55),
    Rgb::new(0x55, 0x55, 0xFF),
    Rgb::new(0x55, 0xFF, 0x55),
    Rgb::new(0x55, 0xFF, 0xFF),
    Rgb::new(0xFF, 0x55, 0x55),
    Rgb::new(0xFF, 0x55, 0xFF),
    Rgb::new(0xFF, 0xFF, 0x55),
    Rgb::new(0xFF, 0xFF, 0xFF),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colours: Vec<Rgb>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::ega_default()
    }
}

impl Palette {
    pub fn ega_default() -> Self {
        Palette {
            colours: EGA_DEFAULT.to_vec(),
        }
    }

    pub fn from_colours(colours: Vec<Rgb>) -> Self {
        Palette { colours }
    }

    /// Detects the encoding from the file length.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        match data.len() {
            EGA_PALETTE_BYTES => Ok(Self::from_fade_scale(data)),
            VGA_PALETTE_BYTES | VGA_PALETTE_WITH_SCREEN_BYTES => {
                Ok(Self::from_vga_scale(&data[..VGA_PALETTE_BYTES]))
            }
            other => Err(DecodeError::UnsupportedVariant(format!(
                "palette of {} bytes (expected {}, {} or {})",
                other, EGA_PALETTE_BYTES, VGA_PALETTE_BYTES, VGA_PALETTE_WITH_SCREEN_BYTES
            ))),
        }
    }

    /// Decodes 0-68 scale triples. Trailing bytes that don't form a triple are ignored.
    pub fn from_fade_scale(data: &[u8]) -> Self {
        let colours = data
            .chunks_exact(3)
            .map(|c| Rgb::new(fade_to_8bit(c[0]), fade_to_8bit(c[1]), fade_to_8bit(c[2])))
            .collect();
        Palette { colours }
    }

    pub fn from_vga_scale(data: &[u8]) -> Self {
        let colours = data
            .chunks_exact(3)
            .map(|c| Rgb::new(vga_to_8bit(c[0]), vga_to_8bit(c[1]), vga_to_8bit(c[2])))
            .collect();
        Palette { colours }
    }

    /// Out-of-range indices resolve to black rather than panicking.
    pub fn colour(&self, index: usize) -> Rgb {
        self.colours.get(index).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.colours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colours.is_empty()
    }

    pub fn colours(&self) -> &[Rgb] {
        &self.colours
    }
}

/// `floor(floor(v*15/16)*256/63)`, clamped to a byte (v = 68 would give 256).
pub fn fade_to_8bit(value: u8) -> u8 {
    let six_bit = (value as u32 * 15) / 16;
    ((six_bit * 256) / 63).min(255) as u8
}

/// `floor((v & 0x3F)*255/63)`
pub fn vga_to_8bit(value: u8) -> u8 {
    (((value & 0x3F) as u32 * 255) / 63) as u8
}
