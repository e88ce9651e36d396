use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use super::html;
use crate::client::TtlCache;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser-identifying header values; origin pages serve different (or no)
/// markup to obvious bots.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Primary content container, located by its element id.
static CONTAINER_ID_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#js_content").expect("valid selector"));
/// Fallback container, located by class-name pattern.
static CONTAINER_CLASS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="rich_media_content"]"#).expect("valid selector"));

/// Errors that can occur while fetching an article page.
#[derive(Debug, Error)]
pub enum ContentError {
    /// URL was empty, relative, or not http(s)
    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

/// Extraction result for one article page.
///
/// A page without a recognizable content container yields an all-empty
/// value rather than an error; structural absence is a degraded result,
/// not a failure.
#[derive(Debug, Clone, Default)]
pub struct FetchedContent {
    pub content_text: String,
    pub content_html: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

/// Fetches full article pages and extracts their content block.
///
/// Successive calls are spaced by a fixed minimum delay tracked through a
/// single shared cursor, independent of the feed client's rate limiter.
/// Full fetch results are cached 24 hours keyed by URL.
pub struct ContentFetcher {
    http: reqwest::Client,
    headers: HeaderMap,
    min_delay: Duration,
    last_request: tokio::sync::Mutex<Option<tokio::time::Instant>>,
    cache: Mutex<TtlCache<String, FetchedContent>>,
}

impl ContentFetcher {
    pub fn new(referer: &str, min_delay: Duration, cache_ttl: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );
        match HeaderValue::from_str(referer) {
            Ok(value) => {
                headers.insert(REFERER, value);
            }
            Err(_) => {
                tracing::warn!(referer = %referer, "Invalid referer value, sending none");
            }
        }

        Self {
            http: reqwest::Client::new(),
            headers,
            min_delay,
            last_request: tokio::sync::Mutex::new(None),
            cache: Mutex::new(TtlCache::new(cache_ttl)),
        }
    }

    /// Fetch an article page and extract text, sanitized HTML, images,
    /// and videos.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::InvalidUrl`] for non-HTTP URLs and typed
    /// transport errors for network failures. A page whose content
    /// container cannot be located is **not** an error; see
    /// [`FetchedContent`].
    pub async fn fetch_article_content(&self, url: &str) -> Result<FetchedContent, ContentError> {
        let parsed = Url::parse(url).map_err(|_| ContentError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ContentError::InvalidUrl(url.to_string()));
        }

        if let Some(cached) = self
            .cache
            .lock()
            .expect("content cache lock poisoned")
            .get(&url.to_string())
        {
            tracing::debug!(url = %url, "Content cache hit");
            return Ok(cached);
        }

        self.honor_min_delay().await;

        tracing::info!(url = %url, "Fetching article content");
        let request = self.http.get(parsed.clone()).headers(self.headers.clone());
        let response = tokio::time::timeout(FETCH_TIMEOUT, request.send())
            .await
            .map_err(|_| ContentError::Timeout)?
            .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        let body = response.text().await.map_err(ContentError::Network)?;
        let content = parse_article_page(&body, &parsed);

        tracing::info!(
            url = %url,
            chars = content.content_text.len(),
            images = content.images.len(),
            videos = content.videos.len(),
            "Extracted article content"
        );

        self.cache
            .lock()
            .expect("content cache lock poisoned")
            .insert(url.to_string(), content.clone());
        Ok(content)
    }

    /// Sleeps until the minimum inter-call spacing has elapsed.
    ///
    /// The cursor is shared across all URLs; holding the lock across the
    /// sleep keeps concurrent callers strictly serialized.
    async fn honor_min_delay(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(tokio::time::Instant::now());
    }
}

/// Locates the article's content container and extracts text and media.
///
/// Container lookup tries the known element id first, then the class-name
/// pattern. Neither match yields an empty result.
pub(crate) fn parse_article_page(body: &str, base_url: &Url) -> FetchedContent {
    let document = Html::parse_document(body);

    let container = document
        .select(&CONTAINER_ID_SELECTOR)
        .next()
        .or_else(|| document.select(&CONTAINER_CLASS_SELECTOR).next());

    let Some(container) = container else {
        tracing::warn!(url = %base_url, "No recognizable content container");
        return FetchedContent::default();
    };

    let content_text = html::extract_text(container);
    let images = html::extract_images(container, base_url);
    let videos = html::extract_videos(container, base_url);

    let rewritten = html::rewrite_media_markup(&container.html(), base_url);
    let content_html = html::wrap_document(&rewritten);

    FetchedContent {
        content_text,
        content_html,
        images,
        videos,
    }
}
