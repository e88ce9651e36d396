//! Article content acquisition and normalization.
//!
//! [`ContentFetcher`] retrieves full article pages and extracts the
//! canonical content block; [`ContentProcessor`] folds a raw feed entry
//! (plus, optionally, fetched content) into the flat payload the sync
//! manager upserts.

mod fetcher;
mod html;
mod processor;

pub use fetcher::{ContentError, ContentFetcher, FetchedContent};
pub use html::html_to_text;
pub use processor::{resolve_author, ArticleDraft, ContentProcessor};
