use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8787";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_LOG_LEVEL: &str = "wellbeing_report=info";
const DEFAULT_MEMORY_CAPACITY: usize = 1_000;

/// Main configuration structure loaded from wellbeing_report.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Text-generation model settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub api_base: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}

/// Report persistence settings. When disabled, only the most recent
/// `memory_capacity` reports are kept in memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub database_url: String,
    pub database_ns: String,
    pub database_db: String,
    pub memory_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: "ws://127.0.0.1:8000".to_string(),
            database_ns: "wellbeing".to_string(),
            database_db: "reports".to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub gemini_api_key: Option<String>,
    pub database_user: String,
    pub database_pass: String,
    pub http_bind: SocketAddr,
    pub request_timeout_ms: u64,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            database_user: "root".to_string(),
            database_pass: "root".to_string(),
            http_bind: DEFAULT_HTTP_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787))),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build runtime configuration from an arbitrary variable source.
    /// Unparseable values keep their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        cfg.gemini_api_key = var("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(user) = var("WELLBEING_DB_USER") {
            cfg.database_user = user;
        }
        if let Some(pass) = var("WELLBEING_DB_PASS") {
            cfg.database_pass = pass;
        }
        match var("WELLBEING_HTTP_BIND").map(|v| v.parse::<SocketAddr>()) {
            Some(Ok(addr)) => cfg.http_bind = addr,
            Some(Err(e)) => tracing::warn!("Ignoring invalid WELLBEING_HTTP_BIND: {}", e),
            None => {}
        }
        if let Some(timeout) = var("WELLBEING_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok())
        {
            cfg.request_timeout_ms = timeout;
        }
        if let Some(level) = var("WELLBEING_LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses WELLBEING_REPORT_CONFIG environment variable or defaults to "wellbeing_report.toml"
    pub fn load() -> anyhow::Result<Self> {
        // Env file resolution:
        // 1) WELLBEING_ENV_FILE if set
        // 2) ./.env
        // 3) ../.env when the API key is still missing
        if let Ok(env_path) = std::env::var("WELLBEING_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
            if std::env::var("GEMINI_API_KEY").is_err() {
                let _ = dotenvy::from_path("../.env");
            }
        }

        let config_path = std::env::var("WELLBEING_REPORT_CONFIG")
            .unwrap_or_else(|_| "wellbeing_report.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply env-first overrides on top of file values
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(model) = var("GEMINI_MODEL").filter(|m| !m.is_empty()) {
            self.generation.model = model;
        }
        if let Some(base) = var("GEMINI_API_BASE").filter(|b| !b.is_empty()) {
            self.generation.api_base = base;
        }
        if let Some(url) = var("WELLBEING_DB_URL") {
            self.storage.database_url = url;
            tracing::debug!("WELLBEING_DB_URL env override applied");
        }
        if let Some(ns) = var("WELLBEING_DB_NS") {
            self.storage.database_ns = ns;
        }
        if let Some(db) = var("WELLBEING_DB_DB") {
            self.storage.database_db = db;
        }
        if let Some(persist) = var("WELLBEING_PERSIST") {
            self.storage.enabled = persist == "1" || persist.eq_ignore_ascii_case("true");
        }
        if let Some(cap) = var("WELLBEING_MEMORY_CAPACITY").and_then(|v| v.parse::<usize>().ok()) {
            self.storage.memory_capacity = cap;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runtime.request_timeout_ms == 0 {
            anyhow::bail!("WELLBEING_REQUEST_TIMEOUT_MS must be > 0");
        }
        if self.generation.model.trim().is_empty() {
            anyhow::bail!("generation.model must not be empty");
        }
        if let Some(t) = self.generation.temperature
            && !(0.0..=2.0).contains(&t)
        {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }
        if self.storage.enabled {
            let url = &self.storage.database_url;
            if !url.starts_with("ws://")
                && !url.starts_with("wss://")
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                tracing::warn!(
                    "Database URL '{}' doesn't start with ws://, wss://, http://, or https://",
                    url
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert!(!config.storage.enabled);
        assert_eq!(config.runtime.request_timeout_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [generation]
            model = "gemini-1.5-pro"
            temperature = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.model, "gemini-1.5-pro");
        assert_eq!(config.generation.temperature, Some(0.4));
        assert_eq!(config.generation.api_base, DEFAULT_API_BASE);
        assert_eq!(config.storage.database_ns, "wellbeing");
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config = Config::from_toml_str("[storage]\nenabled = false\n").unwrap();
        config.apply_overrides(vars(&[
            ("GEMINI_MODEL", "gemini-exp"),
            ("WELLBEING_PERSIST", "true"),
            ("WELLBEING_DB_NS", "staging"),
            ("WELLBEING_MEMORY_CAPACITY", "25"),
        ]));
        assert_eq!(config.generation.model, "gemini-exp");
        assert!(config.storage.enabled);
        assert_eq!(config.storage.database_ns, "staging");
        assert_eq!(config.storage.memory_capacity, 25);
    }

    #[test]
    fn test_runtime_from_vars() {
        let rt = RuntimeConfig::from_vars(vars(&[
            ("GEMINI_API_KEY", "secret"),
            ("WELLBEING_HTTP_BIND", "0.0.0.0:9000"),
            ("WELLBEING_REQUEST_TIMEOUT_MS", "not-a-number"),
        ]));
        assert_eq!(rt.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(rt.http_bind.port(), 9000);
        assert_eq!(rt.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let rt = RuntimeConfig::from_vars(vars(&[("GEMINI_API_KEY", "   ")]));
        assert!(rt.gemini_api_key.is_none());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.runtime.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
