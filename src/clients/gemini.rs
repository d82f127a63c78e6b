use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::clients::traits::{GenerationError, TextGenerator};
use crate::config::Config;

const ERROR_BODY_CAP_CHARS: usize = 2_000;

/// Process-wide client handle, built on first successful use and never replaced
static SHARED_CLIENT: OnceCell<Arc<GeminiClient>> = OnceCell::new();

/// Return the shared Gemini client, constructing it on first use.
///
/// Initialization is single-writer: concurrent first callers block until one
/// of them finishes. A failed construction leaves the cell empty so a later
/// call can try again once configuration is fixed.
pub fn shared_client(config: &Config) -> Result<Arc<GeminiClient>, GenerationError> {
    SHARED_CLIENT
        .get_or_try_init(|| {
            tracing::info!(model = %config.generation.model, "initializing Gemini client");
            GeminiClient::from_config(config).map(Arc::new)
        })
        .cloned()
}

/// Generator that resolves the shared client on each call, so construction
/// (and a missing API key) is only noticed when a request actually needs it.
#[derive(Debug, Clone)]
pub struct LazyGeminiClient {
    config: Arc<Config>,
}

impl LazyGeminiClient {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextGenerator for LazyGeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        shared_client(&self.config)?.generate(prompt).await
    }

    fn model(&self) -> &str {
        &self.config.generation.model
    }
}

/// Gemini `generateContent` over HTTP
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "GEMINI_API_KEY is missing".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            temperature: None,
            max_output_tokens: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        let api_key = config
            .runtime
            .gemini_api_key
            .clone()
            .ok_or_else(|| GenerationError::NotConfigured("GEMINI_API_KEY is missing".into()))?;
        let mut client = Self::new(
            api_key,
            config.generation.model.clone(),
            config.generation.api_base.clone(),
        )?;
        client.temperature = config.generation.temperature;
        client.max_output_tokens = config.generation.max_output_tokens;
        Ok(client)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateContentRequest<'a> {
        let generation_config = if self.temperature.is_some() || self.max_output_tokens.is_some() {
            Some(GenerationParams {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
        } else {
            None
        };
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "calling generateContent");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CAP_CHARS).collect(),
            });
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        Ok(parsed.first_text())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationParams>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// The subset of the generateContent response we read
#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if every step exists
    pub fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_reads_first_candidate_part() {
        let raw = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "1. Rest well."}, {"text": "ignored"}]}},
                {"content": {"parts": [{"text": "second candidate"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.first_text().as_deref(), Some("1. Rest well."));
    }

    #[test]
    fn first_text_is_none_when_path_is_missing() {
        for raw in [
            r#"{}"#,
            r#"{"candidates": []}"#,
            r#"{"candidates": [{"finishReason": "SAFETY"}]}"#,
            r#"{"candidates": [{"content": {"parts": []}}]}"#,
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]}"#,
        ] {
            let resp: GenerateContentResponse = serde_json::from_str(raw).unwrap();
            assert!(resp.first_text().is_none(), "expected no text for {raw}");
        }
    }

    #[test]
    fn request_body_shape() {
        let mut client = GeminiClient::new("key", "gemini-2.0-flash", "https://example.test/v1beta/")
            .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );

        let body = serde_json::to_value(client.request_body("hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );

        client.max_output_tokens = Some(400);
        let body = serde_json::to_value(client.request_body("hello")).unwrap();
        assert_eq!(body["generationConfig"], serde_json::json!({"maxOutputTokens": 400}));
    }

    // One test owns the process-wide cell so ordering cannot interfere
    #[test]
    fn shared_client_retries_failed_init_then_reuses_handle() {
        let no_key = Config::default();
        assert!(matches!(
            shared_client(&no_key),
            Err(GenerationError::NotConfigured(_))
        ));
        assert!(SHARED_CLIENT.get().is_none());

        let mut keyed = Config::default();
        keyed.runtime.gemini_api_key = Some("test-key".into());
        let first = shared_client(&keyed).unwrap();
        let second = shared_client(&keyed).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Built once, never replaced
        let third = shared_client(&no_key).unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(third.model(), "gemini-2.0-flash");
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let err = GeminiClient::new("  ", "m", "https://example.test").unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));

        let config = Config::default();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(GenerationError::NotConfigured(_))
        ));
    }
}
