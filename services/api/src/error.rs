//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for startup and
//! server failures, `HandlerError` for what a request handler reports to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reading_club_core::ports::PortError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub const SIGN_IN_REQUIRED: &str = "Sign-in required.";
pub const GENERATION_UNAVAILABLE: &str = "The AI assistant is temporarily unavailable.";
pub const INTERNAL_FAILURE: &str = "Something went wrong on our side.";

/// A failure reported to the HTTP caller.
///
/// Every variant renders as `{"error": "<fixed message>"}`; backend and
/// database details are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("{}", SIGN_IN_REQUIRED)]
    Unauthorized,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    RateLimited(&'static str),
    #[error("{}", GENERATION_UNAVAILABLE)]
    GenerationUnavailable,
    #[error("{}", INTERNAL_FAILURE)]
    Internal,
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Validation(_) => StatusCode::BAD_REQUEST,
            HandlerError::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Conflict(_) => StatusCode::CONFLICT,
            HandlerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            HandlerError::GenerationUnavailable | HandlerError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a failed generation call, logging the backend detail.
    pub fn generation(e: PortError) -> Self {
        error!("Text generation failed: {}", e);
        HandlerError::GenerationUnavailable
    }

    /// Maps a failed store call, logging the detail.
    pub fn internal(e: PortError) -> Self {
        error!("Store operation failed: {}", e);
        HandlerError::Internal
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
