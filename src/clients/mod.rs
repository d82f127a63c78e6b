pub mod gemini;
pub mod traits;

pub use gemini::{GeminiClient, LazyGeminiClient, shared_client};
pub use traits::{GenerationError, TextGenerator};
