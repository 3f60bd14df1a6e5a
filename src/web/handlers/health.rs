//! # Health Check Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    connected_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    status: String,
    messaging_provider: &'static str,
    messaging_healthy: bool,
}

/// Liveness: GET /health
pub async fn basic_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        connected_clients: state.hub.client_count(),
    })
}

/// Readiness: GET /ready
///
/// Reports 503 while the message broker is unreachable.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let healthy = state.messaging.health_check().await.unwrap_or(false);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if healthy { "ready" } else { "not_ready" }.to_string(),
            messaging_provider: state.messaging.provider_name(),
            messaging_healthy: healthy,
        }),
    )
}
