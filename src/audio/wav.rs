//! RIFF/WAVE output for decoded 8-bit PCM.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::voc::PcmBuffer;

fn wav_spec(pcm: &PcmBuffer) -> WavSpec {
    WavSpec {
        channels: pcm.channels.max(1) as u16,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 8,
        sample_format: SampleFormat::Int,
    }
}

/// hound takes 8-bit samples signed and stores them offset by 128.
fn to_signed(sample: u8) -> i8 {
    (sample as i16 - 128) as i8
}

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    pcm: &PcmBuffer,
) -> Result<(), hound::Error> {
    for &sample in &pcm.samples {
        writer.write_sample(to_signed(sample))?;
    }
    writer.finalize()
}

pub fn encode_wav(pcm: &PcmBuffer) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    write_samples(WavWriter::new(&mut cursor, wav_spec(pcm))?, pcm)?;
    Ok(cursor.into_inner())
}

pub fn write_wav(pcm: &PcmBuffer, path: &Path) -> Result<(), hound::Error> {
    write_samples(WavWriter::create(path, wav_spec(pcm))?, pcm)
}
