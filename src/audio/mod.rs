pub mod prompt;
pub mod transcode;

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Serialize;

use crate::error::AppError;

pub use transcode::Mp3Encoder;

/// Rate every generated buffer is produced at.
pub const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(AppError::Validation(format!(
                "format must be one of wav, mp3 (got '{}')",
                other
            ))),
        }
    }
}

/// Encode mono samples into the requested container.
pub fn encode(
    samples: &[f32],
    sample_rate: u32,
    format: OutputFormat,
    mp3: &Mp3Encoder,
) -> Result<Vec<u8>, AppError> {
    match format {
        OutputFormat::Wav => samples_to_wav(samples, sample_rate),
        OutputFormat::Mp3 => mp3.encode(samples, sample_rate),
    }
}

/// Convert audio samples to 16-bit PCM WAV
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let mut writer = WavWriter::new(cursor, spec)
            .map_err(|e| AppError::Transcode(format!("Failed to create WAV writer: {}", e)))?;

        for sample in samples {
            let sample = if sample.is_finite() { *sample } else { 0.0 };
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(scaled)
                .map_err(|e| AppError::Transcode(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| AppError::Transcode(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(buffer)
}

/// Stretch audio so it plays back at `speed_factor` of its original pace.
///
/// The output has `len / speed_factor` samples, linearly interpolated over
/// the original buffer. A factor of 1.0 returns the input unchanged.
pub fn apply_speed_factor(samples: &[f32], speed_factor: f32) -> Vec<f32> {
    let speed_factor = speed_factor.clamp(0.1, 5.0);
    let target_len = (samples.len() as f64 / f64::from(speed_factor)).round() as usize;
    if target_len == samples.len() || target_len == 0 {
        return samples.to_vec();
    }
    interpolate(samples, target_len)
}

/// Sample `target_len` evenly spaced points across `[0, len - 1]`.
pub(crate) fn interpolate(samples: &[f32], target_len: usize) -> Vec<f32> {
    match samples.len() {
        0 => return Vec::new(),
        1 => return vec![samples[0]; target_len],
        _ => {}
    }

    let last = (samples.len() - 1) as f64;
    let span = target_len.saturating_sub(1).max(1) as f64;

    (0..target_len)
        .map(|i| {
            let pos = i as f64 * last / span;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(samples.len() - 1);
            let frac = (pos - lo as f64) as f32;
            samples[lo] + (samples[hi] - samples[lo]) * frac
        })
        .collect()
}

/// Playback length in seconds, rounded to two decimals.
pub fn duration_seconds(sample_count: usize, sample_rate: u32) -> f64 {
    let seconds = sample_count as f64 / sample_rate as f64;
    (seconds * 100.0).round() / 100.0
}
