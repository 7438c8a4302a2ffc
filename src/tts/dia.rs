use std::sync::Mutex;

use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{info, warn};

use super::artifacts::{DiaConfig, ModelArtifacts};
use super::{lock_session, GenerationRequest, SpeechModel};
use crate::config::{Config, Device};
use crate::error::AppError;

const SPEAKER_ONE: &[u8] = b"[S1]";
const SPEAKER_TWO: &[u8] = b"[S2]";

/// Dia exported as a single ONNX graph: text bytes and sampling settings in,
/// 44.1 kHz mono audio out.
pub struct DiaEngine {
    session: Mutex<Session>,
    config: DiaConfig,
}

impl DiaEngine {
    pub fn load(config: &Config) -> Result<Self, AppError> {
        let artifacts = ModelArtifacts::resolve(
            &config.model_name,
            &config.model_cache_dir,
            config.compute_dtype,
        )?;

        info!(
            "Loading Dia model '{}' from {} ({:?}, {:?})",
            artifacts.name,
            artifacts.model_path.display(),
            config.compute_dtype,
            config.device
        );

        let mut builder = Session::builder()
            .map_err(|e| AppError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::ModelLoad(format!("Failed to set optimization level: {}", e)))?
            .with_deterministic_compute(config.deterministic_compute)
            .map_err(|e| {
                AppError::ModelLoad(format!("Failed to set deterministic compute: {}", e))
            })?;

        if config.device == Device::Cuda {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .build()
                    .error_on_failure()])
                .map_err(|e| {
                    AppError::ModelLoad(format!("Failed to enable CUDA execution provider: {}", e))
                })?;
        }

        let session = builder
            .commit_from_file(&artifacts.model_path)
            .map_err(|e| AppError::ModelLoad(format!("Failed to load model: {}", e)))?;

        info!("Model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            config: artifacts.config,
        })
    }
}

impl SpeechModel for DiaEngine {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<f32>, AppError> {
        let ids = tokenize_text(
            &request.text,
            self.config.data.text_length,
            self.config.data.text_pad_value,
        );
        let prompt = request.audio_prompt.clone().unwrap_or_default();

        // text_ids: [batch, text_length]
        let text_value = Value::from_array((vec![1, ids.len()], ids))
            .map_err(|e| AppError::Generation(format!("Failed to create text tensor: {}", e)))?;

        // audio_prompt: [batch, samples], zero samples when unprompted
        let prompt_value = Value::from_array((vec![1, prompt.len()], prompt))
            .map_err(|e| AppError::Generation(format!("Failed to create prompt tensor: {}", e)))?;

        let max_tokens_value = scalar_i64(request.max_new_tokens as i64)?;
        let cfg_scale_value = scalar_f32(request.cfg_scale)?;
        let temperature_value = scalar_f32(request.temperature)?;
        let top_p_value = scalar_f32(request.top_p)?;
        let top_k_value = scalar_i64(request.cfg_filter_top_k as i64)?;
        // The graph takes a signed seed; only the bit pattern matters.
        let seed_value = scalar_i64(request.seed as i64)?;

        let mut session = lock_session(&self.session);
        let outputs = session
            .run(ort::inputs![
                "text_ids" => text_value,
                "audio_prompt" => prompt_value,
                "max_new_tokens" => max_tokens_value,
                "cfg_scale" => cfg_scale_value,
                "temperature" => temperature_value,
                "top_p" => top_p_value,
                "cfg_filter_top_k" => top_k_value,
                "seed" => seed_value,
            ])
            .map_err(|e| AppError::Generation(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("audio")
            .or_else(|| outputs.get("output"))
            .ok_or_else(|| AppError::Generation("Missing output tensor".to_string()))?;

        let output_view = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Generation(format!("Failed to extract output tensor: {}", e)))?;

        let audio: Vec<f32> = output_view.1.to_vec();
        if audio.is_empty() {
            return Err(AppError::Generation("Model produced no audio".to_string()));
        }

        Ok(audio)
    }
}

fn scalar_f32(value: f32) -> Result<Tensor<f32>, AppError> {
    Value::from_array((vec![1], vec![value]))
        .map_err(|e| AppError::Generation(format!("Failed to create scalar tensor: {}", e)))
}

fn scalar_i64(value: i64) -> Result<Tensor<i64>, AppError> {
    Value::from_array((vec![1], vec![value]))
        .map_err(|e| AppError::Generation(format!("Failed to create scalar tensor: {}", e)))
}

/// Byte-level encoding Dia expects: speaker tags collapse to control bytes
/// 0x01 and 0x02, everything else is raw UTF-8, padded to `max_len`.
pub fn tokenize_text(text: &str, max_len: usize, pad: i64) -> Vec<i64> {
    let bytes = text.as_bytes();
    let mut ids = Vec::with_capacity(max_len);
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(SPEAKER_ONE) {
            ids.push(1);
            i += SPEAKER_ONE.len();
        } else if rest.starts_with(SPEAKER_TWO) {
            ids.push(2);
            i += SPEAKER_TWO.len();
        } else {
            ids.push(bytes[i] as i64);
            i += 1;
        }
    }

    if ids.len() > max_len {
        warn!(
            "Text encodes to {} bytes, truncating to {}",
            ids.len(),
            max_len
        );
        ids.truncate(max_len);
    }
    ids.resize(max_len, pad);
    ids
}
