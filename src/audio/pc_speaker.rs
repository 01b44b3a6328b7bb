//! PC speaker effects: one byte per 140 Hz tick, each an inverse frequency
//! for the programmable interval timer.

pub const PIT_CLOCK_HZ: u32 = 1_193_181;
pub const PC_SPEAKER_TICK_RATE: u32 = 140;
const DIVISOR_SCALE: u32 = 60;

pub const SILENCE_SAMPLE: u8 = 128;
const AMPLITUDE: u8 = 64;

/// Tone frequency for one tick byte; `None` for a rest.
pub fn tone_frequency(divisor: u8) -> Option<f64> {
    if divisor == 0 {
        return None;
    }
    Some(PIT_CLOCK_HZ as f64 / (divisor as u32 * DIVISOR_SCALE) as f64)
}

/// Renders a square wave as unsigned 8-bit PCM at `sample_rate`.
///
/// The phase carries across ticks so consecutive equal notes do not click.
pub fn pc_speaker_tone(divisors: &[u8], sample_rate: u32) -> Vec<u8> {
    if sample_rate == 0 {
        return Vec::new();
    }

    let total = divisors.len() as u64 * sample_rate as u64 / PC_SPEAKER_TICK_RATE as u64;
    let mut samples = Vec::with_capacity(total as usize);
    let mut phase = 0.0f64;

    for (tick, &divisor) in divisors.iter().enumerate() {
        let tick_end = (tick as u64 + 1) * sample_rate as u64 / PC_SPEAKER_TICK_RATE as u64;
        let count = tick_end as usize - samples.len();

        match tone_frequency(divisor) {
            None => samples.extend(std::iter::repeat(SILENCE_SAMPLE).take(count)),
            Some(frequency) => {
                let increment = frequency / sample_rate as f64;
                for _ in 0..count {
                    samples.push(if phase < 0.5 {
                        SILENCE_SAMPLE + AMPLITUDE
                    } else {
                        SILENCE_SAMPLE - AMPLITUDE
                    });
                    phase = (phase + increment).fract();
                }
            }
        }
    }

    samples
}
