//! Typed errors and HTTP mapping.
//!
//! Every variant maps to one of the outcome categories of the API contract:
//! validation failures and legacy per-resource errors are 400, not-found is
//! 404, anything the store rejects unexpectedly is a generic 500. Error
//! bodies are always `{"error": "<message>"}` built by the response module so
//! the CORS headers are present on failures too.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input caught before the data layer.
    #[error("{0}")]
    Validation(String),

    /// Identifier did not resolve to a live record (resources mapped to 404).
    #[error("{0}")]
    NotFound(String),

    /// Identifier did not resolve to a live record, on resources that
    /// historically answered 400 instead of 404 (e.g. users, join tables).
    #[error("{0}")]
    BadRequest(String),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Well-formed request the store rejected or errored on. The message is
    /// generic; the underlying cause is logged at the data-access boundary.
    #[error("{0}")]
    Operation(String),

    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::RouteNotFound
            | AppError::MethodNotAllowed => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Operation(_) | AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message. Raw database errors are never exposed.
    pub fn message(&self) -> String {
        match self {
            AppError::Db(e) => {
                tracing::error!(error = %e, "unhandled database error");
                "An unknown error occurred.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        crate::response::error_response(self.status(), &self.message())
    }
}
