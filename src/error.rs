use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("No text provided")]
    EmptyText,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid audio prompt: {0}")]
    InvalidAudioPrompt(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptyText => "EMPTY_TEXT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidAudioPrompt(_) => "INVALID_AUDIO_PROMPT",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::Transcode(_) => "TRANSCODE_ERROR",
            AppError::Worker(_) => "WORKER_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "INVALID_INPUT",
        }
    }

    /// Validation failures are raised before any model work happens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyText
                | AppError::Validation(_)
                | AppError::InvalidAudioPrompt(_)
                | AppError::Json(_)
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let code = self.code();
        let message = self.to_string();

        tracing::error!("Request failed: {} - {}", code, message);

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
