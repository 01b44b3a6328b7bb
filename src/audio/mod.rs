//! # Sound
//!
//! Digitised effects come in VOC containers, optionally ADPCM-compressed.
//! AdLib effects are converted to IMF register writes, and PC speaker
//! effects are synthesised to PCM.

pub mod adlib;
pub mod adpcm;
pub mod pc_speaker;
pub mod voc;
pub mod wav;

pub use adlib::{convert_adlib_effect, to_imf_bytes, AdlibEffect, ImfCommand};
pub use adpcm::{decode_adpcm, AdpcmState, VocCodec};
pub use pc_speaker::pc_speaker_tone;
pub use voc::{decode_voc, parse_voc, PcmBuffer, SoundBlock, VocBlock};
pub use wav::{encode_wav, write_wav};
