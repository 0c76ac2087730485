//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps engine errors to HTTP status codes and JSON error bodies.
//!
//! Internal error messages are replaced by a generic message. The detail
//! travels in a response extension, and [`expose_internal_details`] copies it
//! into the body only when debug mode is enabled.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fwends_core::ValidationError;
use fwends_engine::EngineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::AppState;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Internal error detail, present only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Identifier or title failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Content type maps to no resource class (415).
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Request body or path could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing session, rejected identity, or not an admin (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authentication endpoint called while authentication is disabled (421).
    #[error("misdirected request: {0}")]
    MisdirectedRequest(String),

    /// Internal server error (500). Message is logged but not returned to
    /// clients outside debug mode.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Internal error detail attached to a response for the debug layer.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::MisdirectedRequest(_) => (StatusCode::MISDIRECTED_REQUEST, "MISDIRECTED_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: String, details: Option<String>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
            details: details.map(serde_json::Value::String),
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if let Self::Internal(detail) = self {
            tracing::error!(error = %detail, "internal server error");
            let mut response = error_response(status, code, INTERNAL_MESSAGE.to_string(), None);
            response.extensions_mut().insert(InternalDetail(detail));
            return response;
        }

        error_response(status, code, self.to_string(), None)
    }
}

/// Response mapper that adds internal error detail to 500 bodies when the
/// service runs with `FWENDS_HTTP_DEBUG`.
pub async fn expose_internal_details(State(state): State<AppState>, response: Response) -> Response {
    if !state.config.http_debug {
        return response;
    }
    match response.extensions().get::<InternalDetail>().cloned() {
        Some(InternalDetail(detail)) => error_response(
            response.status(),
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE.to_string(),
            Some(detail),
        ),
        None => response,
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnsupportedContentType(_) => Self::UnsupportedMediaType(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => e.into(),
            EngineError::NotFound(msg) => Self::NotFound(msg),
            EngineError::Unauthorized(msg) => Self::Unauthorized(msg),
            EngineError::Internal(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (
                AppError::UnsupportedMediaType("x".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (
                AppError::MisdirectedRequest("x".into()),
                StatusCode::MISDIRECTED_REQUEST,
                "MISDIRECTED_REQUEST",
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn engine_errors_map() {
        let err = AppError::from(EngineError::Validation(ValidationError::UnsupportedContentType(
            "text/plain".into(),
        )));
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));

        let err = AppError::from(EngineError::Validation(ValidationError::EmptyTitle));
        assert!(matches!(err, AppError::Validation(_)));

        let err = AppError::from(EngineError::NotFound("pack 1 not found".into()));
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let response = AppError::Internal("db password rejected".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalDetail>().is_some());
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn client_errors_carry_message() {
        let response = AppError::NotFound("pack 9 not found".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["error"]["message"].as_str().unwrap().contains("pack 9"));
    }
}
