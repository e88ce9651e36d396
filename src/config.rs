//! Configuration file parser for pulsefeed.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off), though we log a warning when the file contains potential typos.
//! Secrets (`auth_code`, `metrics_api_key`) can also be supplied through
//! the `PULSEFEED_AUTH_CODE` / `PULSEFEED_METRICS_KEY` environment
//! variables, which take precedence over the file.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `auth_code` and `metrics_api_key` to prevent
/// secret leakage in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the upstream feed aggregator.
    pub aggregator_url: String,

    /// Bearer auth code for the aggregator, if it requires one.
    pub auth_code: Option<String>,

    /// SQLite database file path.
    pub database_path: String,

    /// Maximum entries processed per incremental sync (full sync is unbounded).
    pub max_articles_per_sync: usize,

    /// Whether to fetch full article pages during processing.
    pub fetch_full_content: bool,

    /// Feed-request budget per rolling 60-second window.
    pub max_requests_per_minute: usize,

    /// Minimum delay in seconds between successive article-page fetches.
    pub content_fetch_delay_secs: u64,

    /// Referer sent with article-page requests; origin pages reject
    /// requests without it (hotlink protection).
    pub content_referer: String,

    /// Engagement metrics provider endpoint.
    pub metrics_endpoint: String,

    /// Metrics provider API key. Absent key routes all metrics to the
    /// deterministic simulation.
    pub metrics_api_key: Option<String>,

    /// TTL for cached feed documents, in minutes.
    pub feed_cache_ttl_minutes: u64,

    /// TTL for cached article-page fetch results, in hours.
    pub content_cache_ttl_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregator_url: "http://localhost:4000".to_string(),
            auth_code: None,
            database_path: "data/articles.db".to_string(),
            max_articles_per_sync: 100,
            fetch_full_content: true,
            max_requests_per_minute: 30,
            content_fetch_delay_secs: 2,
            content_referer: "https://mp.weixin.qq.com/".to_string(),
            metrics_endpoint: "https://www.dajiala.com/fbmain/monitor/v3/read_zan_pro"
                .to_string(),
            metrics_api_key: None,
            feed_cache_ttl_minutes: 30,
            content_cache_ttl_hours: 24,
        }
    }
}

/// Mask secrets in Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("aggregator_url", &self.aggregator_url)
            .field("auth_code", &self.auth_code.as_ref().map(|_| "[REDACTED]"))
            .field("database_path", &self.database_path)
            .field("max_articles_per_sync", &self.max_articles_per_sync)
            .field("fetch_full_content", &self.fetch_full_content)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("content_fetch_delay_secs", &self.content_fetch_delay_secs)
            .field("content_referer", &self.content_referer)
            .field("metrics_endpoint", &self.metrics_endpoint)
            .field(
                "metrics_api_key",
                &self.metrics_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("feed_cache_ttl_minutes", &self.feed_cache_ttl_minutes)
            .field("content_cache_ttl_hours", &self.content_cache_ttl_hours)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged
    ///   as warning
    ///
    /// Environment variables `PULSEFEED_AUTH_CODE` and
    /// `PULSEFEED_METRICS_KEY` override the corresponding file values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a corrupted or runaway file
        // cannot exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default().with_env_overrides());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default().with_env_overrides());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default().with_env_overrides());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "aggregator_url",
                "auth_code",
                "database_path",
                "max_articles_per_sync",
                "fetch_full_content",
                "max_requests_per_minute",
                "content_fetch_delay_secs",
                "content_referer",
                "metrics_endpoint",
                "metrics_api_key",
                "feed_cache_ttl_minutes",
                "content_cache_ttl_hours",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            aggregator = %config.aggregator_url,
            "Loaded configuration"
        );
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(code) = std::env::var("PULSEFEED_AUTH_CODE") {
            if !code.is_empty() {
                self.auth_code = Some(code);
            }
        }
        if let Ok(key) = std::env::var("PULSEFEED_METRICS_KEY") {
            if !key.is_empty() {
                self.metrics_api_key = Some(key);
            }
        }
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
