//! HTTP and WebSocket services
//!
//! Two routers, served on their own ports, share the collaborator handles
//! and the session registry:
//! - GET / - streaming transcription over WebSocket
//! - POST /api/recognize - one-shot recognition of an uploaded WAV file
//! - GET /api/health - Health check
//! - GET /api/status - Ports, connections, accelerator memory, models

mod handlers;
mod routes;
mod state;
mod websocket;

pub use handlers::{ErrorResponse, HealthResponse, RecognizeResponse, StatusResponse};
pub use routes::{create_api_router, create_ws_router};
pub use state::AppState;
