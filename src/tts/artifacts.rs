use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::audio::SAMPLE_RATE;
use crate::config::ComputeDtype;
use crate::error::AppError;

const CONFIG_FILE: &str = "config.json";
const MODEL_STEM: &str = "dia";

#[derive(Debug, Clone, Deserialize)]
pub struct DiaConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_text_length")]
    pub text_length: usize,
    #[serde(default)]
    pub text_pad_value: i64,
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

fn default_text_length() -> usize {
    1024
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            text_length: default_text_length(),
            text_pad_value: 0,
        }
    }
}

/// Files making up one exported model.
#[derive(Debug)]
pub struct ModelArtifacts {
    pub name: String,
    pub config: DiaConfig,
    pub model_path: PathBuf,
}

impl ModelArtifacts {
    /// Locate `name` either as a directory on disk or under `cache_dir`,
    /// preferring weights exported at `dtype`.
    pub fn resolve(name: &str, cache_dir: &Path, dtype: ComputeDtype) -> Result<Self, AppError> {
        let direct = PathBuf::from(name);
        let model_dir = if direct.is_dir() {
            direct
        } else {
            cache_dir.join(name)
        };

        if !model_dir.is_dir() {
            return Err(AppError::ModelLoad(format!(
                "model '{}' not found at {}",
                name,
                model_dir.display()
            )));
        }

        let typed = model_dir.join(format!("{}.{}.onnx", MODEL_STEM, dtype.weight_suffix()));
        let plain = model_dir.join(format!("{}.onnx", MODEL_STEM));
        let model_path = if typed.exists() {
            typed
        } else if plain.exists() {
            tracing::warn!(
                "No {} weights for '{}', falling back to {}",
                dtype.weight_suffix(),
                name,
                plain.display()
            );
            plain
        } else {
            return Err(AppError::ModelLoad(format!(
                "model '{}' has no {} weights in {}",
                name,
                dtype.weight_suffix(),
                model_dir.display()
            )));
        };

        let config_path = model_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(AppError::ModelLoad(format!(
                "model '{}' is missing {}",
                name, CONFIG_FILE
            )));
        }
        let config: DiaConfig = serde_json::from_reader(File::open(&config_path)?)
            .map_err(|e| AppError::ModelLoad(format!("invalid {}: {}", CONFIG_FILE, e)))?;

        if config.sample_rate != SAMPLE_RATE {
            return Err(AppError::ModelLoad(format!(
                "model '{}' produces {} Hz audio, expected {} Hz",
                name, config.sample_rate, SAMPLE_RATE
            )));
        }

        Ok(Self {
            name: name.to_string(),
            config,
            model_path,
        })
    }
}
