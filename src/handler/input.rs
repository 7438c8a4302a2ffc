use std::fmt::Debug;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::audio::OutputFormat;
use crate::error::AppError;

pub const DEFAULT_SPEAKER_TAG: &str = "[S1]";
const SPEAKER_TAGS: [&str; 2] = ["[S1]", "[S2]"];

#[derive(Debug, Clone, Deserialize)]
pub struct TextToSpeechInput {
    pub text: String,
    /// Base64 WAV used as a voice prompt.
    #[serde(default)]
    pub audio_prompt: Option<String>,
    /// Transcript of `audio_prompt`.
    #[serde(default)]
    pub audio_prompt_text_input: String,

    #[serde(default = "default_max_new_tokens", deserialize_with = "lax_i64")]
    pub max_new_tokens: i64,
    #[serde(default = "default_cfg_scale", deserialize_with = "lax_f64")]
    pub cfg_scale: f64,
    #[serde(default = "default_temperature", deserialize_with = "lax_f64")]
    pub temperature: f64,
    #[serde(default = "default_top_p", deserialize_with = "lax_f64")]
    pub top_p: f64,
    #[serde(default = "default_cfg_filter_top_k", deserialize_with = "lax_i64")]
    pub cfg_filter_top_k: i64,
    #[serde(default = "default_speed_factor", deserialize_with = "lax_f64")]
    pub speed_factor: f64,
    #[serde(default, deserialize_with = "lax_seed")]
    pub seed: Option<u64>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_max_new_tokens() -> i64 {
    4072
}

fn default_cfg_scale() -> f64 {
    3.0
}

fn default_temperature() -> f64 {
    1.3
}

fn default_top_p() -> f64 {
    0.95
}

fn default_cfg_filter_top_k() -> i64 {
    30
}

fn default_speed_factor() -> f64 {
    0.94
}

fn default_format() -> String {
    "mp3".to_string()
}

impl TextToSpeechInput {
    pub fn from_value(input: Value) -> Result<Self, AppError> {
        Ok(serde_json::from_value(input)?)
    }

    /// Check every numeric range and resolve the output format.
    ///
    /// An empty `text` is not rejected here; callers report it separately.
    pub fn validate(&self) -> Result<OutputFormat, AppError> {
        check_range("max_new_tokens", self.max_new_tokens, 860, 4072)?;
        check_range("cfg_scale", self.cfg_scale, 1.0, 5.0)?;
        check_range("temperature", self.temperature, 1.0, 1.5)?;
        check_range("top_p", self.top_p, 0.80, 1.0)?;
        check_range("cfg_filter_top_k", self.cfg_filter_top_k, 15, 50)?;
        check_range("speed_factor", self.speed_factor, 0.8, 1.0)?;
        self.format.parse()
    }
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<(), AppError>
where
    T: PartialOrd + Debug + Copy,
{
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be between {:?} and {:?} (got {:?})",
            name, min, max, value
        )))
    }
}

// Numeric fields also accept numeric strings, and integer fields accept
// floats with no fractional part ("3.0", 1000.0).
fn lax_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("invalid number {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| de::Error::custom(format!("expected a number, got '{}'", s))),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lax_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    whole_number(&value)
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| de::Error::custom(format!("expected an integer, got {}", value)))
}

fn lax_seed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => whole_number(&value)
            .and_then(|n| u64::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                de::Error::custom(format!("seed must be a non-negative integer, got {}", value))
            }),
    }
}

fn whole_number(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| n.as_f64().and_then(float_to_whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_whole))
        }
        _ => None,
    }
}

fn float_to_whole(v: f64) -> Option<i128> {
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 1e18).then(|| v as i128)
}

/// Prefix the default speaker tag unless the text already names a speaker.
pub fn ensure_speaker_tag(text: &str) -> String {
    if SPEAKER_TAGS.iter().any(|tag| text.contains(tag)) {
        text.to_string()
    } else {
        format!("{} {}", DEFAULT_SPEAKER_TAG, text)
    }
}
