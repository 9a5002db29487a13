//! Audio test file generation

use hound::{WavSpec, WavWriter};
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a silent stereo 16-bit WAV file of `duration_ms`
pub fn generate_silent_wav<P: AsRef<Path>>(path: P, duration_ms: u64) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for _ in 0..total_frames * 2 {
        writer.write_sample(0i16)?;
    }

    writer.finalize()?;
    Ok(())
}
