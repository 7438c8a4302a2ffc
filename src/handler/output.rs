use serde::Serialize;

use crate::audio::OutputFormat;
use crate::error::AppError;

/// The one envelope every job produces.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    Success(SpeechOutput),
    Failure(FailureOutput),
    /// Empty text is reported without a `success` key.
    Rejected(RejectedOutput),
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechOutput {
    pub success: bool,
    pub audio_base64: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub format: OutputFormat,
    pub file_size_bytes: usize,
    pub text_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureOutput {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedOutput {
    pub error: String,
}

impl JobOutput {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::EmptyText => JobOutput::Rejected(RejectedOutput {
                error: err.to_string(),
            }),
            _ => JobOutput::Failure(FailureOutput {
                success: false,
                error: err.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutput::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_serializes_flat() {
        let output = JobOutput::Success(SpeechOutput {
            success: true,
            audio_base64: "AAAA".into(),
            duration_seconds: 1.25,
            sample_rate: 44_100,
            format: OutputFormat::Mp3,
            file_size_bytes: 3,
            text_length: 16,
        });
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({
                "success": true,
                "audio_base64": "AAAA",
                "duration_seconds": 1.25,
                "sample_rate": 44100,
                "format": "mp3",
                "file_size_bytes": 3,
                "text_length": 16,
            })
        );
    }

    #[test]
    fn runtime_failure_carries_success_flag() {
        let output = JobOutput::from_error(&AppError::Generation("boom".into()));
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"success": false, "error": "Generation failed: boom"})
        );
    }

    #[test]
    fn empty_text_has_no_success_key() {
        let output = JobOutput::from_error(&AppError::EmptyText);
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"error": "No text provided"})
        );
    }
}
