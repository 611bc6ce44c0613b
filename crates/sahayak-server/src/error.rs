//! HTTP error types for `Sahayak` server.
//!
//! Maps session and OTP errors into HTTP responses. Every error variant
//! produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use sahayak_core::error::OtpError;

use crate::session::SessionError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Requested resource not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// The request conflicts with the session's current state.
    Conflict(String),
    /// The server cannot take more work right now.
    Unavailable(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::SlotOutOfRange { .. } | OtpError::UnknownDeliveryMethod { .. } => {
                Self::BadRequest(err.to_string())
            }
            OtpError::ControllerClosed => Self::Conflict(err.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { .. } => Self::NotFound(err.to_string()),
            SessionError::AtCapacity { .. } => Self::Unavailable(err.to_string()),
            SessionError::InputDisabled { .. } => Self::Conflict(err.to_string()),
            SessionError::Otp(inner) => inner.into(),
        }
    }
}
