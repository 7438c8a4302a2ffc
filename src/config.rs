use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

pub const DEFAULT_MODEL_NAME: &str = "nari-labs/Dia-1.6B-0626";

/// Numeric precision the model weights were exported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDtype {
    Float32,
    Float16,
    BFloat16,
}

impl ComputeDtype {
    /// Suffix of the weight file exported at this precision.
    pub fn weight_suffix(self) -> &'static str {
        match self {
            ComputeDtype::Float32 => "fp32",
            ComputeDtype::Float16 => "fp16",
            ComputeDtype::BFloat16 => "bf16",
        }
    }
}

impl FromStr for ComputeDtype {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "fp32" => Ok(ComputeDtype::Float32),
            "float16" | "fp16" => Ok(ComputeDtype::Float16),
            "bfloat16" | "bf16" => Ok(ComputeDtype::BFloat16),
            other => Err(AppError::Config(format!(
                "COMPUTE_DTYPE must be float32, float16 or bfloat16 (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl FromStr for Device {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => Err(AppError::Config(format!(
                "DEVICE must be cpu or cuda (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub model_name: String,
    pub compute_dtype: ComputeDtype,
    pub model_cache_dir: PathBuf,
    pub device: Device,
    pub deterministic_compute: bool,
    pub preload_model: bool,
    pub ffmpeg_path: String,
    pub mp3_bitrate: String,
    pub host: String,
    pub port: u16,
    pub test_input: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            compute_dtype: ComputeDtype::Float16,
            model_cache_dir: PathBuf::from("./models"),
            device: Device::Cuda,
            deterministic_compute: true,
            preload_model: true,
            ffmpeg_path: "ffmpeg".to_string(),
            mp3_bitrate: "128k".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            test_input: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so it can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let compute_dtype = match lookup("COMPUTE_DTYPE") {
            Some(v) => v.parse()?,
            None => defaults.compute_dtype,
        };
        let device = match lookup("DEVICE") {
            Some(v) => v.parse()?,
            None => defaults.device,
        };
        let port = match lookup("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a number (got '{}')", v)))?,
            None => defaults.port,
        };

        Ok(Self {
            model_name: lookup("MODEL_NAME").unwrap_or(defaults.model_name),
            compute_dtype,
            model_cache_dir: lookup("MODEL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_cache_dir),
            device,
            deterministic_compute: parse_flag(
                "DETERMINISTIC_COMPUTE",
                lookup("DETERMINISTIC_COMPUTE"),
                defaults.deterministic_compute,
            )?,
            preload_model: parse_flag(
                "PRELOAD_MODEL",
                lookup("PRELOAD_MODEL"),
                defaults.preload_model,
            )?,
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            mp3_bitrate: lookup("MP3_BITRATE").unwrap_or(defaults.mp3_bitrate),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            test_input: lookup("TEST_INPUT").map(PathBuf::from),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid listen address: {}", e)))
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool, AppError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{} must be a boolean (got '{}')",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_published_model() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.compute_dtype, ComputeDtype::Float16);
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.mp3_bitrate, "128k");
        assert!(config.test_input.is_none());
    }

    #[test]
    fn reads_model_settings() {
        let config = config_from(&[
            ("MODEL_NAME", "nari-labs/Dia-1.6B"),
            ("COMPUTE_DTYPE", "bfloat16"),
            ("DEVICE", "cpu"),
            ("PRELOAD_MODEL", "false"),
        ])
        .unwrap();
        assert_eq!(config.model_name, "nari-labs/Dia-1.6B");
        assert_eq!(config.compute_dtype, ComputeDtype::BFloat16);
        assert_eq!(config.device, Device::Cpu);
        assert!(!config.preload_model);
    }

    #[test]
    fn rejects_unknown_dtype() {
        let err = config_from(&[("COMPUTE_DTYPE", "int4")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn rejects_garbled_flag() {
        assert!(config_from(&[("DETERMINISTIC_COMPUTE", "maybe")]).is_err());
    }

    #[test]
    fn builds_listen_addr() {
        let config = config_from(&[("HOST", "127.0.0.1"), ("PORT", "9000")]).unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 9000);
    }
}
