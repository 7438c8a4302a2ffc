use std::process::Command;

use tracing::debug;

use super::samples_to_wav;
use crate::error::AppError;

/// Produces MP3 by writing a WAV intermediate and converting it with ffmpeg.
#[derive(Debug, Clone)]
pub struct Mp3Encoder {
    ffmpeg_path: String,
    bitrate: String,
}

impl Mp3Encoder {
    pub fn new(ffmpeg_path: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            bitrate: bitrate.into(),
        }
    }

    pub fn encode(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AppError> {
        let wav = samples_to_wav(samples, sample_rate)?;

        // Both files are removed when dropped.
        let wav_file = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .map_err(|e| AppError::Transcode(format!("Failed to create temp wav: {}", e)))?;
        std::fs::write(wav_file.path(), &wav)?;

        let mp3_file = tempfile::Builder::new()
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| AppError::Transcode(format!("Failed to create temp mp3: {}", e)))?;

        debug!(
            "Converting {} to {} at {}",
            wav_file.path().display(),
            mp3_file.path().display(),
            self.bitrate
        );

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(wav_file.path())
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(&self.bitrate)
            .arg(mp3_file.path())
            .output()
            .map_err(|e| {
                AppError::Transcode(format!(
                    "Failed to run {} (is it installed?): {}",
                    self.ffmpeg_path, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Transcode(format!("ffmpeg failed: {}", stderr.trim())));
        }

        let mp3 = std::fs::read(mp3_file.path())?;
        if mp3.is_empty() {
            return Err(AppError::Transcode("ffmpeg produced an empty file".into()));
        }

        Ok(mp3)
    }
}
