//! Axum-specific error types and mappings.
//!
//! Maps `SessionError` to HTTP status codes and a JSON body of the form
//! `{"error": "...", "status": 404}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use xfer_core::SessionError;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Service unavailable (e.g. shutting down).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    /// Status code this error is rendered with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg) => msg,
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<SessionError> for HttpError {
    fn from(err: SessionError) -> Self {
        let message = err.user_message();
        match err {
            SessionError::NotFound { .. }
            | SessionError::ArtifactNotFound { .. }
            | SessionError::AlreadyCancelled { .. } => Self::NotFound(message),
            SessionError::Rejected { reason } if reason.contains("shutting down") => {
                Self::ServiceUnavailable(message)
            }
            SessionError::Rejected { .. } => Self::BadRequest(message),
            SessionError::ResolutionFailed { .. }
            | SessionError::Io { .. }
            | SessionError::Cancelled
            | SessionError::Superseded
            | SessionError::Engine { .. }
            | SessionError::Other { .. } => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_status_codes() {
        let cases = [
            (SessionError::not_found("a"), StatusCode::NOT_FOUND),
            (SessionError::artifact_not_found("a"), StatusCode::NOT_FOUND),
            (SessionError::already_cancelled("a"), StatusCode::NOT_FOUND),
            (SessionError::rejected("locator is empty"), StatusCode::BAD_REQUEST),
            (
                SessionError::rejected("service is shutting down"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SessionError::io("Other", "disk"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status(), status);
        }
    }

    #[test]
    fn response_carries_json_status() {
        let response = HttpError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
