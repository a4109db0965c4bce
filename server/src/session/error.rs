//! Session Registry Errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::rtc::WhipError;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An agent is already active in the room.
    #[error("Agent already active in room {0}")]
    DuplicateSession(String),

    /// No active session for the room.
    #[error("No active session in room {0}")]
    NotFound(String),

    /// Signaling or negotiation failure while joining.
    #[error("Failed to connect to room: {0}")]
    ConnectionFailed(String),

    /// Malformed control request.
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::DuplicateSession(_) => {
                (StatusCode::BAD_REQUEST, "DUPLICATE_SESSION", self.to_string())
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            Self::ConnectionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONNECTION_FAILED",
                self.to_string(),
            ),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<WhipError> for SessionError {
    fn from(err: WhipError) -> Self {
        Self::ConnectionFailed(err.to_string())
    }
}
