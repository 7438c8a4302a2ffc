//! Decoding of the base64 audio prompt used for voice continuation.

use std::io::Cursor;

use base64::Engine;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::{interpolate, SAMPLE_RATE};
use crate::error::AppError;

const MIN_SINC_INPUT: usize = 32;

/// Decode a base64 (or `data:` URL) WAV prompt into mono samples at
/// [`SAMPLE_RATE`].
pub fn decode_prompt(data: &str) -> Result<Vec<f32>, AppError> {
    let bytes = base64_decode(data)?;
    let (samples, sample_rate) = decode_wav_bytes(&bytes)?;
    if samples.is_empty() {
        return Err(AppError::InvalidAudioPrompt("prompt contains no audio".into()));
    }

    debug!(
        samples = samples.len(),
        sample_rate, "Decoded audio prompt"
    );

    resample(&samples, sample_rate, SAMPLE_RATE)
}

/// Band-limited conversion from `from_rate` to `to_rate`.
///
/// The output holds `round(len * to_rate / from_rate)` samples aligned with
/// the input; buffers too short for the sinc filter are interpolated.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AppError> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let target_len = ((samples.len() as f64) * ratio).round().max(1.0) as usize;
    if samples.len() < MIN_SINC_INPUT {
        return Ok(interpolate(samples, target_len));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| AppError::InvalidAudioPrompt(format!("resampler init failed: {}", e)))?;

    let delay = resampler.output_delay();
    let mut out = resampler
        .process(&[samples], None)
        .map_err(|e| AppError::InvalidAudioPrompt(format!("resampling failed: {}", e)))?
        .pop()
        .unwrap_or_default();

    // Flush the filter tail so the delayed output still covers the input.
    while out.len() < delay + target_len {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AppError::InvalidAudioPrompt(format!("resampling failed: {}", e)))?
            .pop()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        out.extend(tail);
    }

    out.drain(..delay.min(out.len()));
    out.resize(target_len, 0.0);
    Ok(out)
}

fn base64_decode(data: &str) -> Result<Vec<u8>, AppError> {
    let payload = if data.starts_with("data:") {
        data.split_once(',').map(|(_, b64)| b64).unwrap_or(data)
    } else {
        data
    };

    let normalized: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| AppError::InvalidAudioPrompt(format!("base64 decode error: {}", e)))
}

fn decode_wav_bytes(wav_bytes: &[u8]) -> Result<(Vec<f32>, u32), AppError> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_bytes))
        .map_err(|e| AppError::InvalidAudioPrompt(format!("expected a WAV file: {}", e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(2) as u32;
            let max_val = ((1i64 << (bits - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>(),
    }
    .map_err(|e| AppError::InvalidAudioPrompt(format!("corrupt WAV data: {}", e)))?;

    let mono = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        interleaved
    };

    let samples = mono
        .into_iter()
        .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
        .collect();

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn stereo_wav(frames: &[(i16, i16)], sample_rate: u32) -> Vec<u8> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut buffer = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
            for (l, r) in frames {
                writer.write_sample(*l).unwrap();
                writer.write_sample(*r).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer
    }

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn downmixes_stereo_prompt() {
        let wav = stereo_wav(&[(16384, 0); 100], SAMPLE_RATE);
        let samples = decode_prompt(&encode(&wav)).unwrap();
        assert_eq!(samples.len(), 100);
        assert!((samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn resamples_prompt_to_model_rate() {
        let wav = stereo_wav(&[(0, 0); 2205], 22_050);
        let samples = decode_prompt(&encode(&wav)).unwrap();
        assert_eq!(samples.len(), 4410);
    }

    #[test]
    fn resampling_keeps_level_away_from_edges() {
        let samples = vec![0.25; 22_050];
        let resampled = resample(&samples, 22_050, SAMPLE_RATE).unwrap();
        assert_eq!(resampled.len(), 44_100);
        assert!(resampled[1000..43_000]
            .iter()
            .all(|s| (*s - 0.25).abs() < 1e-2));
    }

    #[test]
    fn resampling_filters_content_above_target_nyquist() {
        // 23 kHz survives at 48 kHz but cannot be represented at 44.1 kHz.
        let tone: Vec<f32> = (0..48_000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 23_000.0 * i as f32 / 48_000.0).sin())
            .collect();
        let resampled = resample(&tone, 48_000, SAMPLE_RATE).unwrap();
        assert_eq!(resampled.len(), 44_100);

        let body = &resampled[1000..43_000];
        let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
        assert!(rms < 0.05, "aliased energy left: rms = {}", rms);
    }

    #[test]
    fn resampling_keeps_in_band_tone() {
        let tone: Vec<f32> = (0..48_000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48_000.0).sin())
            .collect();
        let resampled = resample(&tone, 48_000, SAMPLE_RATE).unwrap();

        let body = &resampled[1000..43_000];
        let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
        assert!((rms - 0.5 / 2f32.sqrt()).abs() < 0.02, "rms = {}", rms);
    }

    #[test]
    fn short_prompts_are_interpolated() {
        let resampled = resample(&[0.0, 1.0, 0.0, -1.0], 22_050, SAMPLE_RATE).unwrap();
        assert_eq!(resampled.len(), 8);
    }

    #[test]
    fn accepts_data_url() {
        let wav = stereo_wav(&[(100, 100); 10], SAMPLE_RATE);
        let url = format!("data:audio/wav;base64,{}", encode(&wav));
        assert_eq!(decode_prompt(&url).unwrap().len(), 10);
    }

    #[test]
    fn rejects_garbage_base64() {
        let err = decode_prompt("not base64!!").unwrap_err();
        assert!(matches!(err, AppError::InvalidAudioPrompt(_)));
    }

    #[test]
    fn rejects_non_wav_payload() {
        let err = decode_prompt(&encode(b"ID3 definitely an mp3")).unwrap_err();
        assert!(matches!(err, AppError::InvalidAudioPrompt(_)));
    }

    #[test]
    fn rejects_empty_wav() {
        let wav = stereo_wav(&[], SAMPLE_RATE);
        assert!(decode_prompt(&encode(&wav)).is_err());
    }
}
