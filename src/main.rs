use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod audio;
mod config;
mod error;
mod handler;
mod tts;

use api::routes::{create_router, AppState};
use config::Config;
use error::AppError;
use handler::Handler;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Dia TTS worker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Model: {} ({:?} on {:?})",
        config.model_name,
        config.compute_dtype,
        config.device
    );

    let state = Arc::new(AppState {
        handler: Handler::from_config(&config),
    });

    if config.preload_model {
        let loader = Arc::clone(&state);
        let loaded = tokio::task::spawn_blocking(move || loader.handler.models().get().map(|_| ()))
            .await
            .map_err(|e| AppError::Worker(format!("model preload task failed: {}", e)))?;
        // Jobs retry the load lazily
        if let Err(e) = loaded {
            tracing::error!("Model preload failed: {}", e);
        }
    }

    if let Some(path) = config.test_input.clone() {
        let worker = Arc::clone(&state);
        return tokio::task::spawn_blocking(move || run_test_input(&worker.handler, &path))
            .await
            .map_err(|e| AppError::Worker(format!("test input task failed: {}", e)))?;
    }

    let addr = config.listen_addr()?;
    tracing::info!("Starting server on http://{}", addr);

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run a single job from a JSON file and print its output.
fn run_test_input(handler: &Handler, path: &Path) -> Result<(), AppError> {
    tracing::info!("Running test input from {}", path.display());

    let event: serde_json::Value = serde_json::from_reader(std::fs::File::open(path)?)?;
    let output = handler.handle(&event);
    if !output.is_success() {
        tracing::warn!("Test job did not succeed");
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
