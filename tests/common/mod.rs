//! Test doubles shared by the orchestrator and HTTP tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wellbeing_report::clients::{GenerationError, TextGenerator};
use wellbeing_report::error::{ReportError, Result};
use wellbeing_report::store::{MemoryReportStore, NewReport, ReportId, ReportStore};
use wellbeing_report::Orchestrator;

pub const FULL_REPORT_TEXT: &str = "Scores (JSON only):\n{\"stress\":4,\"anxiety\":3,\"sleepQuality\":2,\"emotionalWellBeing\":5}\n\nAssessment:\nYou seem moderately stressed.\n\nSuggestions:\n1. Take a walk.\n2. Talk to a friend.\n3. Try deep breathing.\n4. Keep a journal.\n5. Get more sleep.";

pub enum Reply {
    Text(String),
    Nothing,
    Fail,
    Stall(Duration),
}

/// Scripted generator that records every prompt it receives
pub struct FakeGenerator {
    reply: Reply,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<Option<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(Some(text.clone())),
            Reply::Nothing => Ok(None),
            Reply::Fail => Err(GenerationError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
            Reply::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Some("1. Too late to matter.".into()))
            }
        }
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Store that always fails
pub struct BrokenStore;

#[async_trait]
impl ReportStore for BrokenStore {
    async fn save(&self, _report: NewReport) -> Result<ReportId> {
        Err(ReportError::PersistenceError {
            message: "connection refused".into(),
        })
    }

    fn backend(&self) -> &'static str {
        "broken"
    }
}

pub fn orchestrator(generator: Arc<FakeGenerator>) -> (Orchestrator, Arc<MemoryReportStore>) {
    let store = Arc::new(MemoryReportStore::new());
    (Orchestrator::new(generator, store.clone()), store)
}
