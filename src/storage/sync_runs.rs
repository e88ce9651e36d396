use anyhow::Result;

use super::schema::Database;
use super::types::{sync_run_from_row, SyncKind, SyncRun, SyncRunRow, SyncStatus};

const SYNC_RUN_COLUMNS: &str = r#"
    id, account_id, kind, status,
    articles_fetched, articles_new, articles_updated, articles_failed,
    error, started_at, completed_at, duration_seconds
"#;

/// Per-run counters accumulated by the sync manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub fetched: i64,
    pub new: i64,
    pub updated: i64,
    pub failed: i64,
}

impl Database {
    // ========================================================================
    // Sync Run Operations
    // ========================================================================

    /// Open a sync run in the `running` state.
    ///
    /// `account_id` is absent for global (all-accounts) runs.
    pub async fn create_sync_run(
        &self,
        account_id: Option<i64>,
        kind: SyncKind,
    ) -> Result<SyncRun> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO sync_runs (account_id, kind, status, started_at)
            VALUES (?, ?, 'running', ?)
        "#,
        )
        .bind(account_id)
        .bind(kind.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(SyncRun {
            id: result.last_insert_rowid(),
            account_id,
            kind: kind.as_str().to_string(),
            status: SyncStatus::Running,
            fetched: 0,
            new: 0,
            updated: 0,
            failed: 0,
            error: None,
            started_at: now,
            completed_at: None,
            duration_seconds: None,
        })
    }

    /// Finalize a sync run exactly once.
    ///
    /// The update is guarded on `status = 'running'`, so a second
    /// finalization attempt is a no-op and returns false. Duration is
    /// computed from the stored start timestamp.
    pub async fn finalize_sync_run(
        &self,
        id: i64,
        status: SyncStatus,
        counts: RunCounts,
        error: Option<&str>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = ?,
                articles_fetched = ?, articles_new = ?,
                articles_updated = ?, articles_failed = ?,
                error = ?,
                completed_at = ?,
                duration_seconds = ? - started_at
            WHERE id = ? AND status = 'running'
        "#,
        )
        .bind(status.as_str())
        .bind(counts.fetched)
        .bind(counts.new)
        .bind(counts.updated)
        .bind(counts.failed)
        .bind(error)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest sync run, optionally scoped to one account.
    pub async fn get_latest_sync_run(&self, account_id: Option<i64>) -> Result<Option<SyncRun>> {
        let row: Option<SyncRunRow> = match account_id {
            Some(account_id) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM sync_runs WHERE account_id = ? ORDER BY started_at DESC, id DESC LIMIT 1",
                    SYNC_RUN_COLUMNS
                ))
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM sync_runs ORDER BY started_at DESC, id DESC LIMIT 1",
                    SYNC_RUN_COLUMNS
                ))
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(sync_run_from_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_db_with_account() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let account = db
            .create_account("wx-1", "Test", "http://agg/feeds/wx-1.json", None)
            .await
            .unwrap();
        (db, account.id)
    }

    #[tokio::test]
    async fn test_create_run_starts_running() {
        let (db, account_id) = test_db_with_account().await;
        let run = db
            .create_sync_run(Some(account_id), SyncKind::Manual)
            .await
            .unwrap();
        assert_eq!(run.status, SyncStatus::Running);
        assert_eq!(run.kind, "manual");
        assert!(run.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_finalize_success_records_counts() {
        let (db, account_id) = test_db_with_account().await;
        let run = db
            .create_sync_run(Some(account_id), SyncKind::Auto)
            .await
            .unwrap();

        let counts = RunCounts {
            fetched: 10,
            new: 4,
            updated: 3,
            failed: 1,
        };
        let finalized = db
            .finalize_sync_run(run.id, SyncStatus::Success, counts, None)
            .await
            .unwrap();
        assert!(finalized);

        let latest = db
            .get_latest_sync_run(Some(account_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.status, SyncStatus::Success);
        assert_eq!(latest.fetched, 10);
        assert_eq!(latest.new, 4);
        assert_eq!(latest.updated, 3);
        assert_eq!(latest.failed, 1);
        assert!(latest.completed_at.is_some());
        assert!(latest.duration_seconds.is_some());
    }

    #[tokio::test]
    async fn test_finalize_is_exactly_once() {
        let (db, account_id) = test_db_with_account().await;
        let run = db
            .create_sync_run(Some(account_id), SyncKind::Manual)
            .await
            .unwrap();

        let first = db
            .finalize_sync_run(run.id, SyncStatus::Failed, RunCounts::default(), Some("boom"))
            .await
            .unwrap();
        assert!(first);

        // Second finalization must not overwrite the record
        let second = db
            .finalize_sync_run(
                run.id,
                SyncStatus::Success,
                RunCounts {
                    fetched: 99,
                    ..RunCounts::default()
                },
                None,
            )
            .await
            .unwrap();
        assert!(!second);

        let latest = db
            .get_latest_sync_run(Some(account_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.status, SyncStatus::Failed);
        assert_eq!(latest.error.as_deref(), Some("boom"));
        assert_eq!(latest.fetched, 0);
    }

    #[tokio::test]
    async fn test_global_run_has_no_account() {
        let (db, _account_id) = test_db_with_account().await;
        let run = db.create_sync_run(None, SyncKind::Auto).await.unwrap();
        assert!(run.account_id.is_none());

        let latest = db.get_latest_sync_run(None).await.unwrap().unwrap();
        assert_eq!(latest.id, run.id);
    }
}
