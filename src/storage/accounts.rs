use anyhow::Result;

use super::schema::Database;
use super::types::Account;

impl Database {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Create a tracked account for a feed identifier.
    ///
    /// `feed_id` is unique; creating a duplicate is a database error, so
    /// callers check [`get_account_by_feed_id`](Self::get_account_by_feed_id)
    /// first.
    pub async fn create_account(
        &self,
        feed_id: &str,
        name: &str,
        feed_url: &str,
        description: Option<&str>,
    ) -> Result<Account> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (feed_id, name, description, feed_url, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
        "#,
        )
        .bind(feed_id)
        .bind(name)
        .bind(description)
        .bind(feed_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(account_id = id, feed_id = %feed_id, name = %name, "Created account");

        Ok(Account {
            id,
            feed_id: feed_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            avatar_url: None,
            feed_url: feed_url.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up an account by its stable feed identifier.
    pub async fn get_account_by_feed_id(&self, feed_id: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, feed_id, name, description, avatar_url, feed_url,
                   is_active, created_at, updated_at
            FROM accounts
            WHERE feed_id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Look up an account by row id.
    pub async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, feed_id, name, description, avatar_url, feed_url,
                   is_active, created_at, updated_at
            FROM accounts
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// List accounts, optionally restricted to active ones.
    pub async fn get_accounts(&self, active_only: bool) -> Result<Vec<Account>> {
        let query = if active_only {
            r#"
            SELECT id, feed_id, name, description, avatar_url, feed_url,
                   is_active, created_at, updated_at
            FROM accounts
            WHERE is_active = 1
            ORDER BY name
        "#
        } else {
            r#"
            SELECT id, feed_id, name, description, avatar_url, feed_url,
                   is_active, created_at, updated_at
            FROM accounts
            ORDER BY name
        "#
        };

        let accounts = sqlx::query_as::<_, Account>(query)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    /// Activate or deactivate an account.
    ///
    /// Accounts are never hard-deleted; deactivation removes them from
    /// sync rotation while keeping their articles and run history.
    /// Returns false if no account matched.
    pub async fn set_account_active(&self, feed_id: &str, active: bool) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result =
            sqlx::query("UPDATE accounts SET is_active = ?, updated_at = ? WHERE feed_id = ?")
                .bind(active)
                .bind(now)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update an account's display profile.
    pub async fn update_account_profile(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE accounts SET name = ?, description = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
