use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The database is locked by another process. Close it and try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::Locked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Input Types
// ============================================================================

/// Processed article payload ready for insert or overwrite.
///
/// Produced by the content processor (via the sync manager); carries no
/// metrics; counters and scores are applied in a separate step.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub account_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub guid: Option<String>,
    pub content: String,
    pub content_html: Option<String>,
    pub summary: Option<String>,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub published_at: Option<i64>,
    pub word_count: i64,
    pub reading_time_minutes: i64,
}

// ============================================================================
// Data Structures
// ============================================================================

/// Tracked upstream source.
///
/// Created lazily on first sync of an unseen feed identifier; removal
/// deactivates (`is_active = false`) rather than deleting, so articles
/// and run history stay attributable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub feed_id: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub feed_url: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One ingested article.
///
/// `url` is globally unique; the sole deduplication key. `ai_summary`
/// and `tags` are persisted for external collaborators and never written
/// by the pipeline itself.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub guid: Option<String>,
    pub content: String,
    pub content_html: Option<String>,
    pub summary: Option<String>,
    pub ai_summary: Option<String>,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub tags: Vec<String>,
    pub published_at: Option<i64>,
    pub word_count: i64,
    pub reading_time_minutes: i64,
    pub read_count: i64,
    pub like_count: i64,
    pub wow_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub favorite_count: i64,
    pub engagement_rate: f64,
    pub virality_index: f64,
    pub content_value_index: f64,
    pub heat_score: f64,
    pub is_simulated: bool,
    pub metrics_updated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Internal row type for Article queries (used by sqlx FromRow).
/// JSON list columns are decoded in `into_article()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub guid: Option<String>,
    pub content: String,
    pub content_html: Option<String>,
    pub summary: Option<String>,
    pub ai_summary: Option<String>,
    pub cover_image: Option<String>,
    pub images: Option<String>,
    pub videos: Option<String>,
    pub tags: Option<String>,
    pub published_at: Option<i64>,
    pub word_count: i64,
    pub reading_time_minutes: i64,
    pub read_count: i64,
    pub like_count: i64,
    pub wow_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub favorite_count: i64,
    pub engagement_rate: f64,
    pub virality_index: f64,
    pub content_value_index: f64,
    pub heat_score: f64,
    pub is_simulated: bool,
    pub metrics_updated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| serde_json::from_str(s).unwrap_or_default())
        .unwrap_or_default()
}

impl ArticleRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            account_id: self.account_id,
            title: self.title,
            author: self.author,
            url: self.url,
            guid: self.guid,
            content: self.content,
            content_html: self.content_html,
            summary: self.summary,
            ai_summary: self.ai_summary,
            cover_image: self.cover_image,
            images: decode_list(self.images),
            videos: decode_list(self.videos),
            tags: decode_list(self.tags),
            published_at: self.published_at,
            word_count: self.word_count,
            reading_time_minutes: self.reading_time_minutes,
            read_count: self.read_count,
            like_count: self.like_count,
            wow_count: self.wow_count,
            comment_count: self.comment_count,
            share_count: self.share_count,
            favorite_count: self.favorite_count,
            engagement_rate: self.engagement_rate,
            virality_index: self.virality_index,
            content_value_index: self.content_value_index,
            heat_score: self.heat_score,
            is_simulated: self.is_simulated,
            metrics_updated_at: self.metrics_updated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Kind of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Manual,
    Auto,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Manual => "manual",
            SyncKind::Auto => "auto",
        }
    }
}

/// Lifecycle state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Running,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    pub(crate) fn parse(raw: &str) -> SyncStatus {
        match raw {
            "success" => SyncStatus::Success,
            "failed" => SyncStatus::Failed,
            _ => SyncStatus::Running,
        }
    }
}

/// Audit record of one ingestion attempt.
///
/// Created `running` at the start of a run and finalized exactly once;
/// never mutated afterward.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: i64,
    pub account_id: Option<i64>,
    pub kind: String,
    pub status: SyncStatus,
    pub fetched: i64,
    pub new: i64,
    pub updated: i64,
    pub failed: i64,
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub duration_seconds: Option<i64>,
}

/// Row type for sync run queries.
pub(crate) type SyncRunRow = (
    i64,            // id
    Option<i64>,    // account_id
    String,         // kind
    String,         // status
    i64,            // fetched
    i64,            // new
    i64,            // updated
    i64,            // failed
    Option<String>, // error
    i64,            // started_at
    Option<i64>,    // completed_at
    Option<i64>,    // duration_seconds
);

pub(crate) fn sync_run_from_row(row: SyncRunRow) -> SyncRun {
    let (
        id,
        account_id,
        kind,
        status,
        fetched,
        new,
        updated,
        failed,
        error,
        started_at,
        completed_at,
        duration_seconds,
    ) = row;
    SyncRun {
        id,
        account_id,
        kind,
        status: SyncStatus::parse(&status),
        fetched,
        new,
        updated,
        failed,
        error,
        started_at,
        completed_at,
        duration_seconds,
    }
}

/// Sort orders for article listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArticleSort {
    #[default]
    CreatedAt,
    PublishedAt,
    HeatScore,
}

impl ArticleSort {
    pub(crate) fn order_clause(&self) -> &'static str {
        match self {
            ArticleSort::CreatedAt => "created_at DESC",
            ArticleSort::PublishedAt => "published_at DESC",
            ArticleSort::HeatScore => "heat_score DESC",
        }
    }
}

/// Aggregate store statistics for status reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub total_articles: i64,
    pub total_sync_runs: i64,
}
