pub mod input;
pub mod output;

use std::panic::{self, AssertUnwindSafe};

use base64::Engine;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::audio::{self, prompt, Mp3Encoder, SAMPLE_RATE};
use crate::config::Config;
use crate::error::AppError;
use crate::tts::{generation_seed, GenerationRequest, ModelSlot};

pub use input::{ensure_speaker_tag, TextToSpeechInput};
pub use output::{JobOutput, SpeechOutput};

const PREVIEW_CHARS: usize = 100;

pub struct Handler {
    models: ModelSlot,
    mp3: Mp3Encoder,
}

impl Handler {
    pub fn new(models: ModelSlot, mp3: Mp3Encoder) -> Self {
        Self { models, mp3 }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ModelSlot::from_config(config),
            Mp3Encoder::new(config.ffmpeg_path.clone(), config.mp3_bitrate.clone()),
        )
    }

    pub fn models(&self) -> &ModelSlot {
        &self.models
    }

    /// Turn a job payload (`{"input": {...}}`) into exactly one envelope.
    pub fn handle(&self, event: &Value) -> JobOutput {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(event)))
            .unwrap_or_else(|payload| Err(AppError::Worker(panic_message(payload.as_ref()))));

        match result {
            Ok(output) => JobOutput::Success(output),
            Err(err) => {
                if err.is_validation() {
                    warn!("Rejected job: {} - {}", err.code(), err);
                } else {
                    error!("Error: {} - {}", err.code(), err);
                }
                JobOutput::from_error(&err)
            }
        }
    }

    fn run(&self, event: &Value) -> Result<SpeechOutput, AppError> {
        // 1. Validate
        let input = event
            .get("input")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        let job = TextToSpeechInput::from_value(input)?;
        let format = job.validate()?;

        if job.text.is_empty() {
            return Err(AppError::EmptyText);
        }

        // 2. Speaker tags
        let text = ensure_speaker_tag(&job.text);

        let audio_prompt = job
            .audio_prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(prompt::decode_prompt)
            .transpose()?;
        let transcript = job.audio_prompt_text_input.trim();
        let model_text = if audio_prompt.is_some() && !transcript.is_empty() {
            format!("{}\n{}", transcript, text)
        } else {
            text.clone()
        };

        // 3. Seed
        let seed = generation_seed(job.seed);

        // 4. Model
        let model = self.models.get()?;

        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        info!("Generating: {}...", preview);

        // 5. Generate
        let request = GenerationRequest {
            text: model_text,
            audio_prompt,
            max_new_tokens: job.max_new_tokens as u32,
            cfg_scale: job.cfg_scale as f32,
            temperature: job.temperature as f32,
            top_p: job.top_p as f32,
            cfg_filter_top_k: job.cfg_filter_top_k as u32,
            seed,
        };
        let raw = model.generate(&request)?;
        let samples = audio::apply_speed_factor(&raw, job.speed_factor as f32);

        // 6. Transcode
        let encoded = audio::encode(&samples, SAMPLE_RATE, format, &self.mp3)?;

        // 7. Envelope
        Ok(SpeechOutput {
            success: true,
            audio_base64: base64::engine::general_purpose::STANDARD.encode(&encoded),
            duration_seconds: audio::duration_seconds(samples.len(), SAMPLE_RATE),
            sample_rate: SAMPLE_RATE,
            format,
            file_size_bytes: encoded.len(),
            text_length: text.chars().count(),
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
