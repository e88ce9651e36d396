//! Feed ingestion and popularity-scoring pipeline.
//!
//! pulsefeed polls an upstream feed aggregator, enriches each surfaced
//! article with full-text content, images, and engagement metrics, and
//! derives comparable popularity scores. The pipeline is URL-idempotent:
//! re-syncing a feed never duplicates an article, and full-sync mode
//! overwrites content while preserving row identity.

pub mod client;
pub mod config;
pub mod content;
pub mod metrics;
pub mod storage;
pub mod sync;
pub mod util;
