use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::exam_session::{SessionError, StartError};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownQuestion(_) | SessionError::InvalidOption { .. } => {
                Self::BadRequest(err.to_string())
            }
            SessionError::TimeExpired
            | SessionError::Submitting
            | SessionError::Finished
            | SessionError::Closed => Self::Conflict(err.to_string()),
        }
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        Self::Conflict(err.to_string())
    }
}

fn error_body(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response = error_body(StatusCode::UNAUTHORIZED, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => error_body(StatusCode::FORBIDDEN, message.to_string()),
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => error_body(StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => error_body(StatusCode::CONFLICT, message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}
