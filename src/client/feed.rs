use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use super::cache::TtlCache;
use super::rate_limit::RateLimiter;

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while fetching a feed document.
///
/// These cover the full lifecycle of a fetch: network issues, HTTP
/// errors, and parsing failures. Callers distinguish transient transport
/// problems from structural ones instead of observing a uniform `None`.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as JSON Feed, RSS, or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Wire format of an aggregator feed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedFormat {
    Json,
    Rss,
    Atom,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Json => "json",
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "atom",
        }
    }
}

/// One entry of a normalized feed document.
///
/// Field names follow the JSON Feed shape the aggregator emits; RSS and
/// Atom documents are mapped into the same fields. Author values stay as
/// raw JSON (`authors` list of objects, `author` string or object) so the
/// content processor can apply its extraction strategies over exactly
/// what the upstream sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub author: Option<serde_json::Value>,
    #[serde(default)]
    pub authors: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub content_text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
}

/// A feed document normalized to one shape regardless of wire format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedEntry>,
}

/// Client for the upstream feed aggregator.
///
/// Every request passes through the shared [`RateLimiter`] and a retrying
/// transport (429/5xx with exponential backoff, bounded attempts).
/// Fetched documents are cached with a TTL keyed by endpoint URL, so
/// repeated syncs within the window do not hit the aggregator again.
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    auth_code: Option<SecretString>,
    limiter: RateLimiter,
    cache: Mutex<TtlCache<String, FeedDocument>>,
}

impl FeedClient {
    pub fn new(
        base_url: &str,
        auth_code: Option<String>,
        max_requests_per_minute: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_code: auth_code.map(SecretString::from),
            limiter: RateLimiter::new(max_requests_per_minute),
            cache: Mutex::new(TtlCache::new(cache_ttl)),
        }
    }

    /// Aggregator URL for one feed in the given format.
    pub fn feed_url(&self, feed_id: &str, format: FeedFormat) -> String {
        format!("{}/feeds/{}.{}", self.base_url, feed_id, format.as_str())
    }

    /// Fetch and parse the feed for a single source.
    pub async fn fetch_feed(
        &self,
        feed_id: &str,
        format: FeedFormat,
    ) -> Result<FeedDocument, FeedError> {
        let url = self.feed_url(feed_id, format);
        tracing::info!(feed_id = %feed_id, format = format.as_str(), "Fetching feed");
        self.fetch_document(&url, format).await
    }

    /// Fetch and parse the aggregator's combined all-sources feed.
    pub async fn fetch_all_feeds(&self, format: FeedFormat) -> Result<FeedDocument, FeedError> {
        let url = format!("{}/feeds/all.{}", self.base_url, format.as_str());
        tracing::info!(format = format.as_str(), "Fetching all feeds");
        self.fetch_document(&url, format).await
    }

    /// Convenience wrapper returning at most `limit` entries.
    pub async fn get_feed_entries(
        &self,
        feed_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<FeedEntry>, FeedError> {
        let document = self.fetch_feed(feed_id, FeedFormat::Json).await?;
        let mut items = document.items;
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        tracing::info!(feed_id = %feed_id, count = items.len(), "Retrieved feed entries");
        Ok(items)
    }

    /// Liveness probe against the aggregator base URL.
    pub async fn test_connection(&self) -> bool {
        self.limiter.wait_if_needed().await;
        let request = self.http.get(&self.base_url).timeout(PROBE_TIMEOUT);
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(base = %self.base_url, "Aggregator connection OK");
                true
            }
            Ok(response) => {
                tracing::warn!(base = %self.base_url, status = %response.status(), "Aggregator probe failed");
                false
            }
            Err(e) => {
                tracing::warn!(base = %self.base_url, error = %e, "Aggregator unreachable");
                false
            }
        }
    }

    async fn fetch_document(
        &self,
        url: &str,
        format: FeedFormat,
    ) -> Result<FeedDocument, FeedError> {
        if let Some(document) = self
            .cache
            .lock()
            .expect("feed cache lock poisoned")
            .get(&url.to_string())
        {
            tracing::debug!(url = %url, "Feed cache hit");
            return Ok(document);
        }

        let bytes = self.request_with_retry(url).await?;
        let document = match format {
            FeedFormat::Json => serde_json::from_slice::<FeedDocument>(&bytes)
                .map_err(|e| FeedError::Parse(e.to_string()))?,
            FeedFormat::Rss | FeedFormat::Atom => {
                let feed = feed_rs::parser::parse(&bytes[..])
                    .map_err(|e| FeedError::Parse(e.to_string()))?;
                normalize_feed(feed)
            }
        };

        self.cache
            .lock()
            .expect("feed cache lock poisoned")
            .insert(url.to_string(), document.clone());
        Ok(document)
    }

    /// GET with rate limiting, bounded retries, and a body size limit.
    ///
    /// 429 and 5xx responses are retried with exponential backoff
    /// (1s, 2s, 4s); other non-2xx statuses fail immediately.
    async fn request_with_retry(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let mut retry_count = 0;

        loop {
            self.limiter.wait_if_needed().await;

            let mut request = self.http.get(url);
            if let Some(code) = &self.auth_code {
                request = request.header(
                    "Authorization",
                    format!("Bearer {}", code.expose_secret()),
                );
            }

            let response = tokio::time::timeout(FETCH_TIMEOUT, request.send())
                .await
                .map_err(|_| FeedError::Timeout)?
                .map_err(FeedError::Network)?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RETRIES {
                    return Err(FeedError::RateLimited(MAX_RETRIES));
                }
                let delay_secs = 2u64.pow(retry_count); // 1s, 2s, 4s
                tracing::warn!(
                    url = %url,
                    retry = retry_count,
                    delay_secs = delay_secs,
                    "Aggregator rate limited us, backing off"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            if response.status().is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(FeedError::HttpStatus(response.status().as_u16()));
                }
                let delay_secs = 2u64.pow(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %response.status(),
                    retry = retry_count,
                    delay_secs = delay_secs,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            if !response.status().is_success() {
                return Err(FeedError::HttpStatus(response.status().as_u16()));
            }

            return read_limited_bytes(response, MAX_FEED_SIZE).await;
        }
    }
}

/// Map an RSS/Atom document into the JSON Feed shape.
fn normalize_feed(feed: feed_rs::model::Feed) -> FeedDocument {
    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let id = if entry.id.is_empty() {
                link.clone()
            } else {
                Some(entry.id.clone())
            };
            let authors: Vec<serde_json::Value> = entry
                .authors
                .iter()
                .map(|person| serde_json::json!({ "name": person.name }))
                .collect();

            FeedEntry {
                id,
                title: entry.title.map(|t| t.content),
                link,
                content_html: entry.content.and_then(|c| c.body),
                summary: entry.summary.map(|s| s.content),
                authors: if authors.is_empty() {
                    None
                } else {
                    Some(authors)
                },
                published: entry.published.map(|dt| dt.to_rfc3339()),
                updated: entry.updated.map(|dt| dt.to_rfc3339()),
                ..FeedEntry::default()
            }
        })
        .collect();

    FeedDocument {
        title: feed.title.map(|t| t.content),
        description: feed.description.map(|t| t.content),
        items,
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FeedError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FeedError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FeedError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FeedError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_JSON_FEED: &str = r#"{
        "title": "Tech Weekly",
        "description": "A tech feed",
        "items": [
            {"id": "1", "title": "First", "url": "https://example.com/1"},
            {"id": "2", "title": "Second", "url": "https://example.com/2"}
        ]
    }"#;

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Tech Weekly</title>
    <description>A tech feed</description>
    <item>
        <guid>rss-1</guid>
        <title>From RSS</title>
        <link>https://example.com/rss-1</link>
        <description>An item</description>
    </item>
</channel></rss>"#;

    fn client_for(server: &MockServer) -> FeedClient {
        FeedClient::new(&server.uri(), None, 100, Duration::from_secs(1800))
    }

    #[tokio::test]
    async fn test_fetch_feed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/tech.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let document = client.fetch_feed("tech", FeedFormat::Json).await.unwrap();
        assert_eq!(document.title.as_deref(), Some("Tech Weekly"));
        assert_eq!(document.items.len(), 2);
        assert_eq!(document.items[0].url.as_deref(), Some("https://example.com/1"));
    }

    #[tokio::test]
    async fn test_fetch_feed_rss_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/tech.rss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let document = client.fetch_feed("tech", FeedFormat::Rss).await.unwrap();
        assert_eq!(document.title.as_deref(), Some("Tech Weekly"));
        assert_eq!(document.items.len(), 1);
        let entry = &document.items[0];
        assert_eq!(entry.id.as_deref(), Some("rss-1"));
        assert_eq!(entry.title.as_deref(), Some("From RSS"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/rss-1"));
    }

    #[tokio::test]
    async fn test_fetch_feed_sends_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/tech.json"))
            .and(header("Authorization", "Bearer code-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .expect(1)
            .mount(&server)
            .await;

        let client = FeedClient::new(
            &server.uri(),
            Some("code-123".to_string()),
            100,
            Duration::from_secs(1800),
        );
        let document = client.fetch_feed("tech", FeedFormat::Json).await;
        assert!(document.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_feed_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.fetch_feed("missing", FeedFormat::Json).await;
        match result.unwrap_err() {
            FeedError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_feed_503_retry_then_success() {
        use wiremock::matchers::any;

        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let document = client.fetch_feed("tech", FeedFormat::Json).await.unwrap();
        assert_eq!(document.items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_feed_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.fetch_feed("tech", FeedFormat::Json).await;
        match result.unwrap_err() {
            FeedError::Parse(_) => {}
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_feed_uses_cache_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/tech.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .expect(1) // second call must come from cache
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.fetch_feed("tech", FeedFormat::Json).await.unwrap();
        let cached = client.fetch_feed("tech", FeedFormat::Json).await.unwrap();
        assert_eq!(cached.items.len(), 2);
    }

    #[tokio::test]
    async fn test_get_feed_entries_respects_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/tech.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let entries = client.get_feed_entries("tech", Some(1)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("First"));

        let all = client.get_feed_entries("tech", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_feeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/all.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_JSON_FEED))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let document = client.fetch_all_feeds(FeedFormat::Json).await.unwrap();
        assert_eq!(document.items.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_probe_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.test_connection().await);
    }
}
