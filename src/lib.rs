pub mod clients;
pub mod config;
pub mod error;
pub mod extractor;
pub mod http;
pub mod orchestrator;
pub mod prompts;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

pub use extractor::{ExtractionResult, RawModelText, ScoreMap, extract_all};
pub use orchestrator::Orchestrator;

/// Wire the production orchestrator: lazily-initialized Gemini client plus
/// the store selected by configuration.
pub async fn build_orchestrator(config: Arc<config::Config>) -> error::Result<Orchestrator> {
    let store = store::create_store(&config).await?;
    let generator = Arc::new(clients::LazyGeminiClient::new(config.clone()));
    Ok(Orchestrator::new(generator, store)
        .with_timeout(Duration::from_millis(config.runtime.request_timeout_ms)))
}
