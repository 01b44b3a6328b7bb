//! Graphics decoding for both title generations
//!
//! Planar EGA tiles in their various layouts, palettes, CZONE tilesets,
//! generation-1 tile banks and PNG sheet export.

pub mod czone;
pub mod gen1;
pub mod palette;
pub mod planar;
pub mod sheet;

pub use palette::{Palette, Rgb};
pub use planar::{decode_tile, TileLayoutMode};
