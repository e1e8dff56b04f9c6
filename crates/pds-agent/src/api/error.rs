//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pds_core::PdsError;
use serde::Serialize;
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Exchange step rejected")]
    GuardRejected(PdsError),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg.clone(), None),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                None,
            ),
            ApiError::GuardRejected(err) => {
                let (code, details) = match err {
                    PdsError::InvalidState { expected, actual } => (
                        "INVALID_STATE",
                        serde_json::json!({ "expected": expected, "actual": actual }),
                    ),
                    PdsError::InvalidRole { expected, actual } => (
                        "INVALID_ROLE",
                        serde_json::json!({ "expected": expected, "actual": actual }),
                    ),
                    PdsError::InvalidTransition { from, to } => (
                        "INVALID_TRANSITION",
                        serde_json::json!({ "from": from, "to": to }),
                    ),
                    _ => ("REJECTED", serde_json::Value::Null),
                };
                (StatusCode::CONFLICT, code, err.to_string(), Some(details))
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PdsError> for ApiError {
    fn from(err: PdsError) -> Self {
        if err.is_guard_rejection() {
            return ApiError::GuardRejected(err);
        }
        match err {
            PdsError::NotFound(what) => ApiError::NotFound(what),
            PdsError::Configuration(msg) => ApiError::Conflict(msg),
            PdsError::MalformedInput(msg) | PdsError::Serialization(msg) => ApiError::BadRequest(msg),
            PdsError::BackendUnavailable(msg) => ApiError::BadGateway(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
