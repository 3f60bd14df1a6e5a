//! # Web API Error Types
//!
//! HTTP mapping for errors raised behind the web surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::hub::HubError;
use crate::orchestration::DispatchError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Invalid UUID format: {uuid}")]
    InvalidUuid { uuid: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn invalid_uuid(uuid: impl Into<String>) -> Self {
        Self::InvalidUuid { uuid: uuid.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code) = match &self {
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InvalidUuid { .. } => (StatusCode::BAD_REQUEST, "INVALID_UUID"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": self.to_string()
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DispatchError::Validation { message } => ApiError::bad_request(message),
            DispatchError::StateMachine(e) => ApiError::bad_request(e.to_string()),
            other => {
                error!(error = %other, "Dispatch failed");
                ApiError::Internal
            }
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::NotFound { .. } => ApiError::not_found(err.to_string()),
            HubError::Validation { message } => ApiError::bad_request(message),
            other => {
                error!(error = %other, "Photo request failed");
                ApiError::Internal
            }
        }
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_uuid(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_dispatch_errors_map_to_status_codes() {
        let not_found: ApiError = DispatchError::NotFound {
            examination_id: Uuid::nil(),
        }
        .into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = DispatchError::validation("no images").into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_hub_not_found_maps_to_404() {
        let err: ApiError = HubError::not_found("x.jpg").into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
