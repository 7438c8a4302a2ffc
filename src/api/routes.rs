use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::handler::Handler;

pub struct AppState {
    pub handler: Handler,
}

/// Jobs carry base64 audio prompts, well past axum's 2 MiB default.
pub const JOB_BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/runsync",
            post(handlers::runsync).layer(DefaultBodyLimit::max(JOB_BODY_LIMIT_BYTES)),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
