//! Error handling module for the group service.
//!
//! Provides the classified RPC error type with mapping to HTTP status codes and the
//! error response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::directory::DirectoryError;
use crate::names::NameError;

/// Status codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed request or resource name
    InvalidArgument(String),
    /// Upstream has no matching record
    NotFound(String),
    /// Upstream refused the call
    PermissionDenied(String),
    /// Upstream rejected our credentials
    Unauthenticated(String),
    /// Any other failure, with the upstream HTTP status when one was received
    Internal {
        message: String,
        upstream_status: Option<u16>,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
            upstream_status: None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the status code name for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::PermissionDenied(_) => codes::PERMISSION_DENIED,
            AppError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            AppError::Internal { .. } => codes::INTERNAL,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidArgument(msg)
            | AppError::NotFound(msg)
            | AppError::PermissionDenied(msg)
            | AppError::Unauthenticated(msg) => msg,
            AppError::Internal { message, .. } => message,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<NameError> for AppError {
    fn from(err: NameError) -> Self {
        tracing::debug!("Invalid resource name: {}", err);
        AppError::InvalidArgument(err.to_string())
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(msg) => AppError::NotFound(msg),
            DirectoryError::PermissionDenied(msg) => {
                tracing::warn!("Directory permission denied: {}", msg);
                AppError::PermissionDenied(msg)
            }
            DirectoryError::Unauthenticated(msg) => {
                tracing::warn!("Directory rejected credentials: {}", msg);
                AppError::Unauthenticated(msg)
            }
            DirectoryError::Status { status, message } => {
                tracing::error!("Directory error (HTTP {}): {}", status, message);
                AppError::Internal {
                    message,
                    upstream_status: Some(status),
                }
            }
            other => {
                tracing::error!("Directory error: {}", other);
                AppError::internal(other.to_string())
            }
        }
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Internal {
                upstream_status: Some(status),
                ..
            } => Some(serde_json::json!({ "upstreamStatus": status })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message().to_string(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
