use axum::{extract::State, Json};
use serde_json::json;
use std::sync::Arc;

use super::{HealthResponse, JobRequest, JobResponse};
use crate::api::routes::AppState;
use crate::error::AppError;

pub async fn runsync(
    State(state): State<Arc<AppState>>,
    Json(job): Json<JobRequest>,
) -> Result<Json<JobResponse>, AppError> {
    let id = job.id;
    let event = json!({ "input": job.input });

    // Generation blocks for the whole job
    let worker = Arc::clone(&state);
    let output = tokio::task::spawn_blocking(move || worker.handler.handle(&event))
        .await
        .map_err(|e| AppError::Worker(format!("task join error: {}", e)))?;

    Ok(Json(JobResponse {
        id,
        status: "COMPLETED".to_string(),
        output,
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.handler.models().is_loaded(),
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use base64::Engine;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::routes::{create_router, AppState};
    use crate::audio::Mp3Encoder;
    use crate::handler::Handler;
    use crate::tts::testing::{slot_with, NoiseModel};
    use std::sync::Arc;

    fn app() -> axum::Router {
        let handler = Handler::new(
            slot_with(Arc::new(NoiseModel::new(4410))),
            Mp3Encoder::new("/nonexistent/ffmpeg", "128k"),
        );
        create_router(Arc::new(AppState { handler }))
    }

    async fn post_job(body: Value) -> (StatusCode, Value) {
        let response = app()
            .oneshot(
                Request::post("/runsync")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn runsync_returns_wav_envelope() {
        let (status, body) = post_job(json!({
            "id": "job-1",
            "input": {"text": "Hello there", "format": "wav", "seed": 7}
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "job-1");
        assert_eq!(body["status"], "COMPLETED");
        let output = &body["output"];
        assert_eq!(output["success"], true);
        assert_eq!(output["format"], "wav");
        assert_eq!(output["sample_rate"], 44100);
        assert_eq!(output["text_length"], 16);

        let audio = base64::engine::general_purpose::STANDARD
            .decode(output["audio_base64"].as_str().unwrap())
            .unwrap();
        assert!(audio.starts_with(b"RIFF"));
        assert_eq!(output["file_size_bytes"], audio.len());
    }

    #[tokio::test]
    async fn runsync_reports_validation_failure_in_output() {
        let (status, body) = post_job(json!({
            "input": {"text": "Hi", "cfg_scale": 0.5}
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("id").is_none());
        assert_eq!(body["output"]["success"], false);
    }

    #[tokio::test]
    async fn runsync_without_input_fails_in_envelope() {
        let (status, body) = post_job(json!({})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"]["success"], false);
    }

    #[tokio::test]
    async fn runsync_accepts_long_audio_prompt() {
        // 30 s of 16-bit mono at 44.1 kHz, about 3.5 MB once base64 encoded
        let wav = crate::audio::samples_to_wav(&vec![0.1; 30 * 44_100], 44_100).unwrap();
        let prompt = base64::engine::general_purpose::STANDARD.encode(wav);
        assert!(prompt.len() > 2 * 1024 * 1024);

        let (status, body) = post_job(json!({
            "input": {
                "text": "[S1] Carry on.",
                "audio_prompt": prompt,
                "audio_prompt_text_input": "[S1] Long reference.",
                "format": "wav",
            }
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["output"]["success"], true);
    }

    #[tokio::test]
    async fn health_reports_lazy_model() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], false);
    }
}
