/// Unified error types for Quillpad
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the blog backend
#[derive(Error, Debug)]
pub enum BlogError {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, badly signed or expired session token
    #[error("{0}")]
    Unauthenticated(String),

    /// Acting on a resource owned by someone else
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate username or email
    #[error("{0}")]
    Conflict(String),

    /// Missing account, post or comment
    #[error("{0}")]
    NotFound(String),

    /// Self-follow, blank comment text
    #[error("{0}")]
    InvalidOperation(String),

    /// Wrong password on sign-in or account deletion.
    /// Rendered as HTTP 500 to stay wire compatible with existing clients.
    #[error("{0}")]
    CredentialMismatch(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT encoding errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlogError {
    /// True when the underlying database error is a UNIQUE/PRIMARY KEY violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BlogError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for BlogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort_unstable();
        BlogError::Validation(format!("invalid fields: {}", fields.join(", ")))
    }
}

/// JSON error body: `{"error": "<reason>"}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert BlogError to HTTP response
impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BlogError::Validation(_) | BlogError::InvalidOperation(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            BlogError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            BlogError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            BlogError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            BlogError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            BlogError::CredentialMismatch(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            BlogError::Database(_)
            | BlogError::Io(_)
            | BlogError::Jwt(_)
            | BlogError::Internal(_) => {
                tracing::error!("request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(), // Don't leak details
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type alias for blog operations
pub type BlogResult<T> = Result<T, BlogError>;
