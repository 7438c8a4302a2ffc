pub mod handlers;
pub mod routes;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::JobOutput;

/// A serverless job as delivered by the platform.
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    pub output: JobOutput,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}
