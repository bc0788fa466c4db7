//! # Web API Error Types
//!
//! Errors returned by handlers, rendered as
//! `{"timestamp", "status", "error", "message", "path"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::error::PollerError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    /// Detail is logged, never sent to the caller
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// An [`ApiError`] bound to the request path it answers
#[derive(Debug)]
pub struct PathedApiError {
    error: ApiError,
    path: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest { message } | Self::NotFound { message } => message.clone(),
            Self::ServiceUnavailable => "Service temporarily unavailable".to_string(),
            Self::Internal { .. } => "Unexpected error".to_string(),
        }
    }

    pub fn at(self, path: impl Into<String>) -> PathedApiError {
        PathedApiError {
            error: self,
            path: path.into(),
        }
    }

    fn render(self, path: Option<String>) -> Response {
        let status = self.status_code();
        if let Self::Internal { message } = &self {
            error!(path = ?path, error = %message, "Unhandled API error");
        }
        let body = ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.public_message(),
            path,
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render(None)
    }
}

impl IntoResponse for PathedApiError {
    fn into_response(self) -> Response {
        self.error.render(Some(self.path))
    }
}

impl From<PollerError> for ApiError {
    fn from(error: PollerError) -> Self {
        match error {
            PollerError::ValidationError(message) => Self::BadRequest { message },
            PollerError::TaskNotFound { .. } => Self::NotFound {
                message: error.to_string(),
            },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
