//! Request orchestration: build prompt → generate → extract → (persist) → respond.
//!
//! Each request is a single attempt. Nothing is retried and no state is kept
//! between requests apart from the shared generator and store handles.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clients::{GenerationError, TextGenerator};
use crate::error::{ReportError, Result};
use crate::extractor::{self, ExtractionResult, RawModelText};
use crate::prompts::{self, InputRecord, PromptError, PromptKind};
use crate::store::{NewReport, ReportId, ReportStore};

/// Inbound body for the suggestions-only path
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    #[serde(default)]
    pub user_inputs: Option<InputRecord>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

/// Inbound body for the full-report path
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_inputs: Option<InputRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(flatten)]
    pub extraction: ExtractionResult,
    pub report_id: ReportId,
}

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    PromptBuilt,
    AwaitingUpstream,
    Extracted,
    Failed,
}

struct RequestRun {
    kind: &'static str,
    stage: Stage,
}

impl RequestRun {
    fn start(kind: &'static str) -> Self {
        Self {
            kind,
            stage: Stage::Idle,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(kind = self.kind, from = ?self.stage, to = ?next, "request stage");
        self.stage = next;
    }

    fn fail(&mut self, err: ReportError) -> ReportError {
        self.advance(Stage::Failed);
        if err.is_client_error() {
            tracing::info!(kind = self.kind, "rejected request: {}", err);
        } else {
            tracing::error!(kind = self.kind, "request failed: {}", err);
        }
        err
    }
}

impl From<PromptError> for ReportError {
    fn from(err: PromptError) -> Self {
        ReportError::invalid_request(err.to_string())
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ReportStore>,
    timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            generator,
            store,
            timeout: None,
        }
    }

    /// Abort the upstream call after `timeout`; an aborted call is an upstream error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.store.as_ref()
    }

    /// Suggestions-only path. The model's whole reply is the numbered list.
    pub async fn generate_suggestions(&self, req: SuggestionsRequest) -> Result<SuggestionsResponse> {
        let mut run = RequestRun::start("suggestions");

        let prompt = prompts::build(
            PromptKind::Suggestions,
            req.user_inputs.as_ref(),
            req.risk_level.as_deref(),
            req.probability,
        )
        .map_err(|e| run.fail(e.into()))?;
        run.advance(Stage::PromptBuilt);

        let raw = self.call_upstream(&prompt, &mut run).await?;
        let suggestions = extractor::extract_suggestions(raw.as_str());
        run.advance(Stage::Extracted);

        tracing::info!(count = suggestions.len(), "generated suggestions");
        Ok(SuggestionsResponse { suggestions })
    }

    /// Full-report path: extract every field, then persist the report.
    pub async fn generate_report(&self, req: ReportRequest) -> Result<ReportResponse> {
        let mut run = RequestRun::start("report");

        let user_inputs = req
            .user_inputs
            .filter(|record| !record.is_missing())
            .ok_or_else(|| run.fail(ReportError::invalid_request("Missing userInputs field")))?;
        let prompt = prompts::report_prompt(&user_inputs);
        run.advance(Stage::PromptBuilt);

        let raw = self.call_upstream(&prompt, &mut run).await?;
        let extraction = raw.extract();
        run.advance(Stage::Extracted);

        let report = NewReport {
            user_id: req.user_id,
            user_inputs,
            scores: extraction.scores.clone(),
            assessment: extraction.assessment.clone(),
            suggestions: extraction.suggestions.clone(),
        };
        let report_id = self.persist(report, &mut run).await?;

        tracing::info!(
            report_id = %report_id,
            scores = extraction.scores.len(),
            suggestions = extraction.suggestions.len(),
            "generated report"
        );
        Ok(ReportResponse {
            extraction,
            report_id,
        })
    }

    async fn persist(&self, report: NewReport, run: &mut RequestRun) -> Result<ReportId> {
        self.store.save(report).await.map_err(|e| {
            tracing::debug!(backend = self.store.backend(), "report store rejected save");
            let err = match e {
                err @ ReportError::PersistenceError { .. } => err,
                other => ReportError::PersistenceError {
                    message: other.to_string(),
                },
            };
            run.fail(err)
        })
    }

    async fn call_upstream(&self, prompt: &str, run: &mut RequestRun) -> Result<RawModelText> {
        run.advance(Stage::AwaitingUpstream);

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.generator.generate(prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(GenerationError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                    })
                }),
            None => self.generator.generate(prompt).await,
        };

        match outcome {
            Ok(Some(text)) if !text.trim().is_empty() => Ok(RawModelText::from(text)),
            Ok(_) => Err(run.fail(ReportError::UpstreamEmpty)),
            Err(e) => Err(run.fail(e.into())),
        }
    }
}
