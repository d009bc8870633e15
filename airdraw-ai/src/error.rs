//! Error types for airdraw-ai
//!
//! [`Error`] carries the pipeline's distinct failure conditions; none of them
//! is ever coerced into a default prediction. [`ApiError`] maps them onto HTTP
//! responses for the API host.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Transport-level failure talking to the phone-side sensor server
///
/// Variants distinguish connection failure from timeout from other transport
/// errors so callers can report something actionable.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Connection refused, host unreachable, DNS failure
    #[error("cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// No response within the request timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Non-success HTTP status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Phone answered but refused the command
    #[error("phone rejected '{command}' at {url}")]
    Rejected { url: String, command: String },

    /// Response body did not match the expected document shape
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    /// Any other transport error
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl CollaboratorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CollaboratorError::Timeout { .. })
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, CollaboratorError::Connect { .. })
    }
}

/// Main error type for airdraw-ai
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer than two samples in a capture
    #[error("Insufficient data: capture has {samples} samples, at least 2 are required")]
    InsufficientData { samples: usize },

    /// Normalization parameters or tensors disagree with the channel count
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Sensor server unreachable, timed out, or answered nonsense
    #[error("Sensor collaborator unreachable: {0}")]
    CollaboratorUnreachable(#[from] CollaboratorError),

    /// Classifier failed or returned an unexpected shape
    #[error("Inference error: {0}")]
    Inference(String),

    /// CSV input could not be read
    #[error("CSV error: {0}")]
    Csv(String),

    /// Coordinator operation called from the wrong state
    #[error("Invalid capture state: {0}")]
    InvalidState(String),

    /// Model artifact or configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// airdraw-common error
    #[error("Common error: {0}")]
    Common(#[from] airdraw_common::Error),

    /// A spawned task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using airdraw-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - a live capture is already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Pipeline failure
    #[error(transparent)]
    Pipeline(#[from] Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Pipeline(err) => match err {
                Error::InsufficientData { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_DATA")
                }
                Error::Csv(_) => (StatusCode::BAD_REQUEST, "INVALID_CSV"),
                Error::CollaboratorUnreachable(e) if e.is_timeout() => {
                    (StatusCode::GATEWAY_TIMEOUT, "PHONE_TIMEOUT")
                }
                Error::CollaboratorUnreachable(_) => {
                    (StatusCode::BAD_GATEWAY, "PHONE_UNREACHABLE")
                }
                Error::Inference(_) => (StatusCode::BAD_GATEWAY, "INFERENCE_ERROR"),
                Error::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
                Error::ShapeMismatch(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "SHAPE_MISMATCH")
                }
                Error::Config(_) | Error::Io(_) | Error::Common(_) | Error::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let timeout = ApiError::from(Error::CollaboratorUnreachable(CollaboratorError::Timeout {
            url: "http://phone/control".to_string(),
        }));
        assert_eq!(timeout.status_and_code().0, StatusCode::GATEWAY_TIMEOUT);

        let refused = ApiError::from(Error::CollaboratorUnreachable(CollaboratorError::Connect {
            url: "http://phone/control".to_string(),
            message: "connection refused".to_string(),
        }));
        assert_eq!(refused.status_and_code().0, StatusCode::BAD_GATEWAY);

        let short = ApiError::from(Error::InsufficientData { samples: 1 });
        assert_eq!(short.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);

        let busy = ApiError::Conflict("capture in progress".to_string());
        assert_eq!(busy.status_and_code().1, "CONFLICT");
    }

    #[test]
    fn test_collaborator_error_kinds() {
        let err = CollaboratorError::Timeout { url: "u".to_string() };
        assert!(err.is_timeout());
        assert!(!err.is_connect());
        assert_eq!(err.to_string(), "request to u timed out");
    }
}
