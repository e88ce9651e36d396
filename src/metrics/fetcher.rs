use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::{Digest, Sha256};

const API_TIMEOUT: Duration = Duration::from_secs(20);

/// Simulated read counts land in this range.
const SIM_READ_RANGE: std::ops::RangeInclusive<i64> = 100..=50_000;

// Provider responses have carried several field names per metric over
// time; the tables below are tried in order. This mapping is inferred
// upstream behavior, not a documented contract; treat it as
// configuration to validate against the live provider.
const READ_ALIASES: &[&str] = &["real_read_num", "read_num", "read"];
const LIKE_ALIASES: &[&str] = &["old_like_num", "like_num", "zan"];
const WOW_ALIASES: &[&str] = &["look_num", "looking"];
const COMMENT_ALIASES: &[&str] = &["comment_num", "comment_count"];
const SHARE_ALIASES: &[&str] = &["share_num"];
const FAVORITE_ALIASES: &[&str] = &["fav_num", "collect_num"];

/// Fields whose presence (with a non-zero value) marks a response as
/// actually carrying metrics rather than an empty success.
const RECOGNITION_FIELDS: &[&str] = &["read_num", "real_read_num", "like_num", "read", "zan"];

/// Raw engagement counters for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArticleMetrics {
    pub read_count: i64,
    pub like_count: i64,
    pub wow_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub favorite_count: i64,
    /// True when the counters came from the deterministic simulation
    /// rather than the provider.
    pub is_simulated: bool,
}

/// Obtains engagement counters from the paid metrics provider.
///
/// Without an API key every call returns simulated counters. With a key,
/// any provider failure (transport error, non-200, provider error code,
/// or a success response carrying no recognizable metrics) also falls
/// back to simulation. This fetcher never surfaces an error to callers.
pub struct MetricsFetcher {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl MetricsFetcher {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            tracing::warn!("Metrics API key not configured, all metrics will be simulated");
        }
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.map(SecretString::from),
        }
    }

    /// Whether real provider lookups are enabled.
    pub fn is_live(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch counters for one article URL.
    ///
    /// Infallible by design: every failure path degrades to the
    /// deterministic simulation for the same URL.
    pub async fn fetch_article_metrics(&self, url: &str) -> ArticleMetrics {
        let Some(api_key) = &self.api_key else {
            return simulated_metrics(url);
        };

        tracing::info!(url = %url, "Fetching real metrics");
        let payload = serde_json::json!({
            "url": url,
            "key": api_key.expose_secret(),
        });

        let response = match self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .timeout(API_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Metrics request failed, falling back to simulation");
                return simulated_metrics(url);
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                url = %url,
                status = %response.status(),
                "Metrics provider HTTP error, falling back to simulation"
            );
            return simulated_metrics(url);
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Unparsable metrics response, falling back to simulation");
                return simulated_metrics(url);
            }
        };

        match map_provider_response(&body) {
            Some(metrics) => {
                tracing::info!(url = %url, read = metrics.read_count, "Fetched real metrics");
                metrics
            }
            None => {
                tracing::warn!(url = %url, "Metrics response unusable, falling back to simulation");
                simulated_metrics(url)
            }
        }
    }
}

/// Maps a provider response body into canonical counters.
///
/// Returns `None` when the provider signalled an error or the success
/// payload carries no recognizable metric field (e.g. an article too new
/// to have stats yet).
fn map_provider_response(body: &Value) -> Option<ArticleMetrics> {
    let code = body.get("code").and_then(Value::as_i64)?;
    if code != 0 && code != 1 {
        let msg = body.get("msg").and_then(Value::as_str).unwrap_or("unknown");
        tracing::error!(code = code, msg = %msg, "Metrics provider error");
        return None;
    }

    // Metrics live under "data" or, in older responses, at the top level
    let data = match body.get("data") {
        Some(data @ Value::Object(_)) => data,
        _ => body,
    };

    let recognized = RECOGNITION_FIELDS.iter().any(|field| {
        data.get(*field)
            .and_then(Value::as_i64)
            .is_some_and(|v| v != 0)
    });
    if !recognized {
        return None;
    }

    Some(ArticleMetrics {
        read_count: first_metric(data, READ_ALIASES).unwrap_or(0),
        like_count: first_metric(data, LIKE_ALIASES).unwrap_or(0),
        wow_count: first_metric(data, WOW_ALIASES).unwrap_or(0),
        comment_count: first_metric(data, COMMENT_ALIASES).unwrap_or(0),
        share_count: first_metric(data, SHARE_ALIASES).unwrap_or(0),
        favorite_count: first_metric(data, FAVORITE_ALIASES).unwrap_or(0),
        is_simulated: false,
    })
}

/// First alias present with a numeric value wins.
fn first_metric(data: &Value, aliases: &[&str]) -> Option<i64> {
    aliases.iter().find_map(|alias| {
        data.get(alias)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    })
}

/// Deterministic placeholder counters for one URL.
///
/// The RNG is seeded from a SHA-256 digest of the URL, so repeated calls
/// for the same URL always produce identical counters; fallback values
/// stay idempotent across syncs. Engagement counters are drawn as fixed
/// fractions of the read count, mirroring the bands real articles show.
pub(crate) fn simulated_metrics(url: &str) -> ArticleMetrics {
    let digest = Sha256::digest(url.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    let mut rng = StdRng::from_seed(seed);

    let read_count = rng.random_range(SIM_READ_RANGE);
    let fraction = |rng: &mut StdRng, lo: f64, hi: f64| -> i64 {
        (read_count as f64 * rng.random_range(lo..hi)) as i64
    };

    ArticleMetrics {
        read_count,
        like_count: fraction(&mut rng, 0.01, 0.05),
        wow_count: fraction(&mut rng, 0.005, 0.02),
        comment_count: fraction(&mut rng, 0.001, 0.01),
        share_count: fraction(&mut rng, 0.005, 0.03),
        favorite_count: fraction(&mut rng, 0.005, 0.02),
        is_simulated: true,
    }
}
