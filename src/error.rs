//! Boundary, service and HTTP error types.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Reasons an inbound WebSocket frame is refused at the boundary.
///
/// These never reach the session; the offending connection gets a `commandRejected` reply.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Frame was not a known command or had the wrong shape.
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Frame parsed but carried out-of-range values.
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
    /// Binary frames are not part of the protocol.
    #[error("unsupported frame type")]
    UnsupportedFrame,
}

/// Errors surfaced by the service layer around the session actor.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The session task has stopped and no longer accepts commands.
    #[error("session unavailable")]
    SessionUnavailable,
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::SessionUnavailable => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
