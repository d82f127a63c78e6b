//! Domain-specific error types for wellbeing-report

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for report generation.
///
/// Only the orchestration layer produces these. The response extractor is
/// total and degrades to empty fields instead of failing.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream returned no usable text")]
    UpstreamEmpty,

    #[error("Upstream error: {message}")]
    UpstreamError { message: String },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ReportError {
    /// Caller errors are surfaced as 4xx, everything else as 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ReportError::InvalidRequest { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ReportError::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ReportError {
    fn from(err: anyhow::Error) -> Self {
        ReportError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<surrealdb::Error> for ReportError {
    fn from(err: surrealdb::Error) -> Self {
        ReportError::PersistenceError {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        ReportError::UpstreamError {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
