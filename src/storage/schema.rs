use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{DatabaseError, StoreStats};

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Locked` if another process has the database
    /// locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to
        // release before returning SQLITE_BUSY. Using pragma() ensures all
        // connections in the pool inherit the setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; one sync process at a time needs few
        // concurrent readers
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::Locked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All schema changes are wrapped in a single transaction so a failure
    /// mid-migration rolls back to the previous consistent state. All
    /// statements use `IF NOT EXISTS` for idempotency, so re-running on an
    /// existing database is a no-op.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (per-connection setting, outside the transaction)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                feed_id TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                avatar_url TEXT,
                feed_url TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                author TEXT,
                url TEXT UNIQUE NOT NULL,
                guid TEXT,
                content TEXT NOT NULL DEFAULT '',
                content_html TEXT,
                summary TEXT,
                ai_summary TEXT,
                cover_image TEXT,
                images TEXT,
                videos TEXT,
                tags TEXT,
                published_at INTEGER,
                word_count INTEGER NOT NULL DEFAULT 0,
                reading_time_minutes INTEGER NOT NULL DEFAULT 0,
                read_count INTEGER NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0,
                wow_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                share_count INTEGER NOT NULL DEFAULT 0,
                favorite_count INTEGER NOT NULL DEFAULT 0,
                engagement_rate REAL NOT NULL DEFAULT 0,
                virality_index REAL NOT NULL DEFAULT 0,
                content_value_index REAL NOT NULL DEFAULT 0,
                heat_score REAL NOT NULL DEFAULT 0,
                is_simulated INTEGER NOT NULL DEFAULT 0,
                metrics_updated_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY,
                account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                articles_fetched INTEGER NOT NULL DEFAULT 0,
                articles_new INTEGER NOT NULL DEFAULT 0,
                articles_updated INTEGER NOT NULL DEFAULT 0,
                articles_failed INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                duration_seconds INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_account ON articles(account_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_heat ON articles(heat_score DESC)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_runs_account ON sync_runs(account_id)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Aggregate store statistics for status reporting.
    pub async fn store_stats(&self) -> Result<StoreStats> {
        let (total_accounts, active_accounts): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(CASE WHEN is_active = 1 THEN 1 END) FROM accounts",
        )
        .fetch_one(&self.pool)
        .await?;
        let (total_articles,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        let (total_sync_runs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_runs")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total_accounts,
            active_accounts,
            total_articles,
            total_sync_runs,
        })
    }
}
