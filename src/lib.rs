//! Decoders for the asset formats of two generations of a 1990s EGA
//! side-scroller: planar tiles and screens, level maps, VOC/ADPCM sound,
//! AdLib and PC speaker effects, and actor sprites.

pub mod audio;
pub mod binary_utils;
pub mod error;
pub mod extractor;
pub mod graphics;
pub mod level;
pub mod sprites;

pub use error::DecodeError;
