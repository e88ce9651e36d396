use serde_json::Value;

use super::fetcher::ContentFetcher;
use super::html;
use crate::client::FeedEntry;
use crate::util::{clean_text, count_words, parse_date, summarize};

/// Reading speed assumed for the reading-time estimate.
const WORDS_PER_MINUTE: i64 = 200;

/// Canonical article payload produced from one feed entry.
///
/// The draft is ready for upsert but carries no new-vs-update decision;
/// that belongs to the sync manager. An empty `url` marks an entry that
/// cannot be deduplicated and is rejected upstream.
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub guid: String,
    pub content_text: String,
    pub content_html: String,
    pub summary: String,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub published_at: Option<i64>,
    pub word_count: i64,
    pub reading_time_minutes: i64,
}

/// Normalizes raw feed entries into [`ArticleDraft`] payloads.
///
/// Field resolution walks an explicit fallback order per field; every
/// step degrades to the next on empty or missing input, and nothing here
/// ever fails an entry outright.
pub struct ContentProcessor {
    fetcher: ContentFetcher,
}

// Ordered author extraction strategies. Feeds disagree on where the
// author lives (JSON Feed `authors` list, legacy `author` object or
// string, aggregator-specific `author_name`); each strategy reads one
// shape and the first non-empty, non-placeholder hit wins.
type AuthorStrategy = fn(&FeedEntry) -> Option<String>;

const AUTHOR_STRATEGIES: &[AuthorStrategy] = &[
    author_from_authors_list,
    author_from_author_field,
    author_from_author_name,
];

fn author_from_authors_list(entry: &FeedEntry) -> Option<String> {
    let authors = entry.authors.as_ref()?;
    let names: Vec<String> = authors
        .iter()
        .filter_map(|author| match author {
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            Value::String(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn author_from_author_field(entry: &FeedEntry) -> Option<String> {
    match entry.author.as_ref()? {
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
        Value::String(name) => Some(name.clone()),
        _ => None,
    }
}

fn author_from_author_name(entry: &FeedEntry) -> Option<String> {
    entry.author_name.clone()
}

/// Resolves the entry author through the strategy chain.
///
/// Returns `None` for missing, whitespace-only, or placeholder ("unknown")
/// values so the caller can apply its own final fallback (the account
/// display name) instead of a literal leaking into the store.
pub fn resolve_author(entry: &FeedEntry) -> Option<String> {
    for strategy in AUTHOR_STRATEGIES {
        if let Some(author) = strategy(entry) {
            let author = clean_text(&author);
            if !author.is_empty() && !author.eq_ignore_ascii_case("unknown") {
                return Some(author);
            }
        }
    }
    None
}

impl ContentProcessor {
    pub fn new(fetcher: ContentFetcher) -> Self {
        Self { fetcher }
    }

    /// Process one feed entry into an article payload.
    ///
    /// With `fetch_full_content` set and a URL present, the content
    /// fetcher supplies text/html/media; otherwise (or when the fetch
    /// fails or finds nothing) the entry's own content fields are used,
    /// converted from HTML to plain text.
    pub async fn process_article(
        &self,
        entry: &FeedEntry,
        fetch_full_content: bool,
    ) -> ArticleDraft {
        let title = clean_text(entry.title.as_deref().unwrap_or_default());
        let author = resolve_author(entry);

        let url = entry
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| entry.link.clone())
            .unwrap_or_default();
        let guid = entry
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| url.clone());

        let mut content_text = String::new();
        let mut content_html = String::new();
        let mut images = Vec::new();
        let mut videos = Vec::new();

        if fetch_full_content && !url.is_empty() {
            tracing::debug!(title = %title, "Fetching full content");
            match self.fetcher.fetch_article_content(&url).await {
                Ok(fetched) => {
                    content_text = fetched.content_text;
                    content_html = fetched.content_html;
                    images = fetched.images;
                    videos = fetched.videos;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Full content fetch failed, using feed body");
                }
            }
        }

        // Feed-provided body is the fallback whenever the page fetch was
        // disabled, failed, or extracted nothing
        if content_text.is_empty() {
            let raw = entry
                .content_html
                .as_deref()
                .filter(|s| !s.is_empty())
                .or(entry.content_text.as_deref().filter(|s| !s.is_empty()))
                .or(entry.content.as_deref().filter(|s| !s.is_empty()))
                .or(entry.description.as_deref().filter(|s| !s.is_empty()))
                .or(entry.summary.as_deref().filter(|s| !s.is_empty()))
                .unwrap_or_default();
            content_html = raw.to_string();
            content_text = html::html_to_text(raw);
        }

        let summary = match entry.summary.as_deref().map(clean_text) {
            Some(s) if !s.is_empty() => s,
            _ => summarize(&content_text),
        };

        let cover_image = images
            .first()
            .cloned()
            .or_else(|| entry.image.clone().filter(|i| !i.is_empty()));

        let published_at = [
            entry.date_published.as_deref(),
            entry.published.as_deref(),
            entry.updated.as_deref(),
            entry.date_modified.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .and_then(parse_date)
        .map(|dt| dt.timestamp());

        let word_count = count_words(&content_text) as i64;
        let reading_time_minutes = (word_count / WORDS_PER_MINUTE).max(1);

        ArticleDraft {
            title,
            author,
            url,
            guid,
            content_text,
            content_html,
            summary,
            cover_image,
            images,
            videos,
            published_at,
            word_count,
            reading_time_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn processor() -> ContentProcessor {
        ContentProcessor::new(ContentFetcher::new(
            "https://posts.example.com/",
            Duration::ZERO,
            Duration::from_secs(86400),
        ))
    }

    fn entry_with(f: impl FnOnce(&mut FeedEntry)) -> FeedEntry {
        let mut entry = FeedEntry::default();
        f(&mut entry);
        entry
    }

    #[test]
    fn test_author_from_authors_list_joins_names() {
        let entry = entry_with(|e| {
            e.authors = Some(vec![json!({"name": "Alice"}), json!({"name": "Bob"})]);
        });
        assert_eq!(resolve_author(&entry).as_deref(), Some("Alice, Bob"));
    }

    #[test]
    fn test_author_from_authors_list_of_strings() {
        let entry = entry_with(|e| {
            e.authors = Some(vec![json!("Carol")]);
        });
        assert_eq!(resolve_author(&entry).as_deref(), Some("Carol"));
    }

    #[test]
    fn test_author_from_object_field() {
        let entry = entry_with(|e| {
            e.author = Some(json!({"name": "Dana"}));
        });
        assert_eq!(resolve_author(&entry).as_deref(), Some("Dana"));
    }

    #[test]
    fn test_author_from_string_field() {
        let entry = entry_with(|e| {
            e.author = Some(json!("Eve"));
        });
        assert_eq!(resolve_author(&entry).as_deref(), Some("Eve"));
    }

    #[test]
    fn test_author_falls_through_to_author_name() {
        let entry = entry_with(|e| {
            e.author = Some(json!(""));
            e.author_name = Some("Frank".to_string());
        });
        assert_eq!(resolve_author(&entry).as_deref(), Some("Frank"));
    }

    #[test]
    fn test_author_unknown_placeholder_rejected() {
        let entry = entry_with(|e| {
            e.author = Some(json!("Unknown"));
        });
        assert_eq!(resolve_author(&entry), None);
    }

    #[test]
    fn test_author_whitespace_rejected() {
        let entry = entry_with(|e| {
            e.author = Some(json!("   "));
        });
        assert_eq!(resolve_author(&entry), None);
    }

    #[tokio::test]
    async fn test_url_prefers_url_over_link() {
        let entry = entry_with(|e| {
            e.url = Some("https://example.com/canonical".to_string());
            e.link = Some("https://example.com/other".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.url, "https://example.com/canonical");
    }

    #[tokio::test]
    async fn test_guid_falls_back_to_url() {
        let entry = entry_with(|e| {
            e.link = Some("https://example.com/a".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.guid, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_content_falls_back_to_feed_body() {
        let entry = entry_with(|e| {
            e.url = Some("https://example.com/a".to_string());
            e.description = Some("<p>Feed <b>body</b> text</p><script>x()</script>".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.content_text, "Feed\nbody\ntext");
        assert!(draft.content_html.contains("Feed <b>body</b>"));
    }

    #[tokio::test]
    async fn test_summary_prefers_feed_summary() {
        let entry = entry_with(|e| {
            e.summary = Some("  A provided   summary ".to_string());
            e.content_text = Some("long content body".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.summary, "A provided summary");
    }

    #[tokio::test]
    async fn test_summary_derived_from_content() {
        let entry = entry_with(|e| {
            e.content_text = Some("x".repeat(300));
        });
        let draft = processor().process_article(&entry, false).await;
        assert!(draft.summary.ends_with("..."));
        assert_eq!(draft.summary.chars().count(), 203);
    }

    #[tokio::test]
    async fn test_cover_image_from_entry_field() {
        let entry = entry_with(|e| {
            e.image = Some("https://img.example.com/cover.jpg".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(
            draft.cover_image.as_deref(),
            Some("https://img.example.com/cover.jpg")
        );
    }

    #[tokio::test]
    async fn test_published_date_fallback_order() {
        let entry = entry_with(|e| {
            e.published = Some("2024-01-15T00:00:00Z".to_string());
            e.updated = Some("2024-02-20T00:00:00Z".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.published_at, Some(1705276800));
    }

    #[tokio::test]
    async fn test_unparsable_date_yields_none() {
        let entry = entry_with(|e| {
            e.published = Some("someday soon".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.published_at, None);
    }

    #[tokio::test]
    async fn test_word_count_and_reading_time() {
        let entry = entry_with(|e| {
            e.content_text = Some("word ".repeat(450));
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.word_count, 450);
        assert_eq!(draft.reading_time_minutes, 2);
    }

    #[tokio::test]
    async fn test_reading_time_minimum_one_minute() {
        let entry = entry_with(|e| {
            e.content_text = Some("short".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.reading_time_minutes, 1);
    }

    #[tokio::test]
    async fn test_title_whitespace_collapsed() {
        let entry = entry_with(|e| {
            e.title = Some("  Spaced \n Title  ".to_string());
        });
        let draft = processor().process_article(&entry, false).await;
        assert_eq!(draft.title, "Spaced Title");
    }
}
