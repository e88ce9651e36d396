//! Upstream aggregator access: rate limiting, response caching, and the
//! feed client itself.

mod cache;
mod feed;
mod rate_limit;

pub use cache::TtlCache;
pub use feed::{FeedClient, FeedDocument, FeedEntry, FeedError, FeedFormat};
pub use rate_limit::RateLimiter;
