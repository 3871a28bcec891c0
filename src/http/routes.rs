use super::handlers;
use super::state::AppState;
use super::websocket;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Uploaded audio files can be long recordings
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Create the HTTP API router
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        // Health and status
        .route("/api/health", get(handlers::health_check))
        .route("/api/status", get(handlers::get_status))
        // One-shot file recognition
        .route("/api/recognize", post(handlers::recognize_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the streaming router (WebSocket at `/`)
pub fn create_ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
