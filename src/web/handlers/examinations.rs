//! # Examination Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use crate::orchestration::DispatchSummary;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// Start analysis of every attached image: POST /api/examinations/:id/analyze
pub async fn start_analysis(
    State(state): State<AppState>,
    Path(examination_id): Path<String>,
) -> ApiResult<(StatusCode, Json<DispatchSummary>)> {
    let examination_id = Uuid::parse_str(&examination_id)?;
    let summary = state.dispatcher.start_analysis(examination_id).await?;

    info!(
        examination_id = %examination_id,
        dispatched = summary.dispatched,
        failed = summary.failed,
        "Analysis started via API"
    );
    Ok((StatusCode::ACCEPTED, Json(summary)))
}
