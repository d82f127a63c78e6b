//! Report persistence.
//!
//! Storage is a collaborator of the orchestrator, not part of extraction.
//! Its failures surface as [`ReportError::PersistenceError`].

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::extractor::ScoreMap;
use crate::prompts::InputRecord;

const REPORTS_TABLE: &str = "mental_health_reports";

/// Opaque handle for a stored report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully extracted report ready to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub user_id: Option<String>,
    pub user_inputs: InputRecord,
    pub scores: ScoreMap,
    pub assessment: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: ReportId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: NewReport,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: NewReport) -> Result<ReportId>;

    /// Short backend label for logs and the info endpoint
    fn backend(&self) -> &'static str;
}

/// SurrealDB-backed report store
pub struct SurrealReportStore {
    db: Arc<Surreal<Client>>,
}

impl SurrealReportStore {
    pub fn new(db: Arc<Surreal<Client>>) -> Self {
        Self { db }
    }

    /// Connect, sign in as root and select the configured namespace/database.
    pub async fn connect(config: &Config) -> Result<Self> {
        // The Ws engine expects host:port without a scheme
        fn normalize_ws_url(s: &str) -> &str {
            s.strip_prefix("ws://")
                .or_else(|| s.strip_prefix("wss://"))
                .or_else(|| s.strip_prefix("http://"))
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s)
        }

        let storage = &config.storage;
        tracing::info!(url = %storage.database_url, "Connecting to SurrealDB");

        let db = Surreal::new::<Ws>(normalize_ws_url(&storage.database_url))
            .await
            .map_err(|e| ReportError::PersistenceError {
                message: format!(
                    "Failed to connect to SurrealDB at {}: {}",
                    storage.database_url, e
                ),
            })?;

        db.signin(Root {
            username: &config.runtime.database_user,
            password: &config.runtime.database_pass,
        })
        .await
        .map_err(|e| ReportError::PersistenceError {
            message: format!(
                "Failed to authenticate with SurrealDB as user '{}': {}",
                config.runtime.database_user, e
            ),
        })?;

        db.use_ns(&storage.database_ns)
            .use_db(&storage.database_db)
            .await?;

        Ok(Self::new(Arc::new(db)))
    }
}

#[async_trait]
impl ReportStore for SurrealReportStore {
    async fn save(&self, report: NewReport) -> Result<ReportId> {
        let sql = format!(
            "CREATE {REPORTS_TABLE} SET created_at = time::now(), user_id = $user_id, \
             user_inputs = $user_inputs, scores = $scores, assessment = $assessment, \
             suggestions = $suggestions RETURN VALUE <string> id;"
        );
        let scores = serde_json::to_value(&report.scores)?;
        let user_inputs = report.user_inputs.as_value().clone();

        let id: Option<String> = self
            .db
            .query(sql)
            .bind(("user_id", report.user_id))
            .bind(("user_inputs", user_inputs))
            .bind(("scores", scores))
            .bind(("assessment", report.assessment))
            .bind(("suggestions", report.suggestions))
            .await?
            .take(0)?;

        id.map(ReportId::new)
            .ok_or_else(|| ReportError::PersistenceError {
                message: format!("CREATE {REPORTS_TABLE} returned no id"),
            })
    }

    fn backend(&self) -> &'static str {
        "surrealdb"
    }
}

/// Process-local store used when persistence is disabled and in tests.
///
/// Bounded: once full, the least recently saved report is evicted. Ids it
/// hands out do not survive a restart.
pub struct MemoryReportStore {
    reports: RwLock<LruCache<ReportId, StoredReport>>, // Bounded in-memory cache (LRU)
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReportStore {
    pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1_000) {
        Some(cap) => cap,
        None => NonZeroUsize::MIN,
    };

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            reports: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Look up a report without refreshing its eviction order.
    pub async fn get(&self, id: &ReportId) -> Option<StoredReport> {
        self.reports.read().await.peek(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn capacity(&self) -> usize {
        self.reports.read().await.cap().get()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, report: NewReport) -> Result<ReportId> {
        let id = ReportId::new(format!("{}:{}", REPORTS_TABLE, uuid::Uuid::new_v4()));
        let stored = StoredReport {
            id: id.clone(),
            created_at: Utc::now(),
            report,
        };
        if let Some((evicted, _)) = self.reports.write().await.push(id.clone(), stored) {
            tracing::debug!(evicted = %evicted, "memory store full, dropped oldest report");
        }
        Ok(id)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Build the store selected by configuration.
pub async fn create_store(config: &Config) -> Result<Arc<dyn ReportStore>> {
    if config.storage.enabled {
        return Ok(Arc::new(SurrealReportStore::connect(config).await?));
    }

    let capacity = NonZeroUsize::new(config.storage.memory_capacity).ok_or_else(|| {
        ReportError::Config {
            message: "storage.memory_capacity must be > 0 when persistence is disabled".into(),
        }
    })?;
    tracing::warn!(
        capacity = capacity.get(),
        "Report persistence disabled; keeping only the most recent reports in memory. \
         Report ids are not durable and are lost on restart"
    );
    Ok(Arc::new(MemoryReportStore::with_capacity(capacity)))
}
