//! Audio Test Fixture Generator
//!
//! Writes short WAV files with a known length for probe tests.

use std::path::Path;

/// Write a mono 16-bit 440 Hz tone of `duration_seconds`
pub fn generate_tone_wav(path: &Path, duration_seconds: f64, sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (duration_seconds * sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = 0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Same tone, returned as bytes (for serving over HTTP)
pub fn tone_wav_bytes(duration_seconds: f64, sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let file = tempfile::Builder::new().suffix(".wav").tempfile()?;
    generate_tone_wav(file.path(), duration_seconds, sample_rate)?;
    Ok(std::fs::read(file.path())?)
}
