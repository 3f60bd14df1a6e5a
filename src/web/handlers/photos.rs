//! # Photo Handlers

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// Raw photo bytes: GET /api/photos/:filename
pub async fn get_photo(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let (bytes, content_type) = state.hub.photos().read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
