//! # Web Surface
//!
//! axum router for the API process: the device hub websocket, photo
//! retrieval, the analysis trigger and health probes. Websocket clients are
//! not authenticated.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/ws", get(handlers::websocket::ws_upgrade))
        .route("/api/photos/:filename", get(handlers::photos::get_photo))
        .route(
            "/api/examinations/:id/analyze",
            post(handlers::examinations::start_analysis),
        )
        .with_state(state)
}
