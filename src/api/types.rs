// src/api/types.rs

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::errors::QaError;

/// Request body for asking a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Request body for submitting comparison feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub session_id: String,
    /// One of `fast`, `streamed`, `both`, `neither`.
    pub verdict: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a session error onto an HTTP status and body.
pub fn api_error(err: QaError) -> ApiError {
    if !err.is_local() {
        tracing::warn!("API request failed: {}", err);
    }
    let (status, kind) = match &err {
        QaError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        QaError::Unsupported(_) => (StatusCode::CONFLICT, "unsupported"),
        QaError::StaleSession { .. } => (StatusCode::CONFLICT, "stale_session"),
        QaError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
        QaError::AlreadySubmitted { .. } => (StatusCode::CONFLICT, "already_submitted"),
        QaError::Transport { .. } => (StatusCode::BAD_GATEWAY, "transport"),
        QaError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind,
        }),
    )
}
