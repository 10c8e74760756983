//! API error handling
//!
//! Engine failures map onto HTTP status codes with a machine-readable
//! `error` code: 422 for rejected commands, 409 for concurrent
//! modification, 403 for missing authorization, 404 for unknown cases.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_dispute::{DisputeError, EngineError, TransitionError};

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A lifecycle command the engine refused
    #[error("{message}")]
    Rejected {
        code: &'static str,
        message: String,
        details: Option<Vec<String>>,
    },
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => {
                error!(message = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg, None),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None),
            ApiError::Rejected { code, message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, message, details)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Unauthorized { .. } => ApiError::Forbidden(err.to_string()),
            TransitionError::Bind(ref bind) => ApiError::Rejected {
                code: err.code(),
                details: Some(bind.missing_variables.clone()),
                message: err.to_string(),
            },
            other => ApiError::Rejected {
                code: other.code(),
                message: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Transition(transition) => transition.into(),
            EngineError::Dispute(DisputeError::InvalidFacts(msg)) => ApiError::Validation(msg),
            EngineError::Dispute(other) => ApiError::Internal(other.to_string()),
            EngineError::NotFound(id) => ApiError::NotFound(format!("Case {} not found", id)),
            EngineError::StoreConflict { .. } => ApiError::Conflict(err.to_string()),
            EngineError::Store(port) if port.is_transient() => ApiError::Unavailable(port.to_string()),
            EngineError::Store(port) => ApiError::Internal(port.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(_) => ApiError::Forbidden(err.to_string()),
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
        }
    }
}

impl From<DisputeError> for ApiError {
    fn from(err: DisputeError) -> Self {
        EngineError::Dispute(err).into()
    }
}
