use async_trait::async_trait;
use thiserror::Error;

use crate::error::ReportError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("http error: {0}")]
    Http(String),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("client not configured: {0}")]
    NotConfigured(String),
}

/// Every generation failure, including a client that cannot be built, is
/// part of the upstream call.
impl From<GenerationError> for ReportError {
    fn from(err: GenerationError) -> Self {
        ReportError::UpstreamError {
            message: err.to_string(),
        }
    }
}

/// A single-shot text generator.
///
/// Takes one user-role message and returns the generated text, or `None`
/// when the provider answered without any text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError>;

    /// Model identifier for logs and the info endpoint
    fn model(&self) -> &str;
}
