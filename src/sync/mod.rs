//! Orchestration of one full ingestion cycle per account:
//! fetch → process → dedup/upsert → metrics → score → persist.

use crate::client::{FeedClient, FeedFormat};
use crate::content::{ArticleDraft, ContentProcessor};
use crate::metrics::{compute_scores, MetricsFetcher};
use crate::storage::{Account, Database, NewArticle, RunCounts, SyncKind, SyncStatus};

/// Per-run entry counters.
///
/// `fetched` is the number of entries the feed returned; each entry ends
/// up in exactly one of `new`/`updated`/`skipped`/`failed`, except that a
/// metrics persistence failure adds to `failed` without reverting the
/// entry's insert/update count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncStats {
    fn run_counts(&self) -> RunCounts {
        RunCounts {
            fetched: self.fetched as i64,
            new: self.new as i64,
            updated: self.updated as i64,
            failed: self.failed as i64,
        }
    }
}

/// Structured result of one account sync.
///
/// Every failure mode surfaces here as data; the sync manager never
/// propagates an error type past its boundary.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed { account: String, stats: SyncStats },
    Failed { error: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }

    pub fn stats(&self) -> Option<&SyncStats> {
        match self {
            SyncOutcome::Completed { stats, .. } => Some(stats),
            SyncOutcome::Failed { .. } => None,
        }
    }
}

/// One account's entry in an all-accounts report.
#[derive(Debug, Clone)]
pub struct AccountSyncResult {
    pub feed_id: String,
    pub account: String,
    pub outcome: SyncOutcome,
}

/// Aggregate result of syncing every active account.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub total_accounts: usize,
    pub total_new: usize,
    pub total_updated: usize,
    pub total_failed: usize,
    pub results: Vec<AccountSyncResult>,
}

/// Result of the add-account management operation.
#[derive(Debug, Clone)]
pub enum AddAccountOutcome {
    Added {
        account: String,
        initial_sync: Option<SyncOutcome>,
    },
    AlreadyExists,
    Failed {
        error: String,
    },
}

/// Drives the ingestion pipeline.
///
/// Owns the collaborating services for its lifetime; the application
/// entry point constructs one manager and reuses it for every run.
pub struct SyncManager {
    db: Database,
    feeds: FeedClient,
    processor: ContentProcessor,
    metrics: MetricsFetcher,
    max_articles_per_sync: usize,
    fetch_full_content: bool,
}

impl SyncManager {
    pub fn new(
        db: Database,
        feeds: FeedClient,
        processor: ContentProcessor,
        metrics: MetricsFetcher,
        max_articles_per_sync: usize,
        fetch_full_content: bool,
    ) -> Self {
        Self {
            db,
            feeds,
            processor,
            metrics,
            max_articles_per_sync,
            fetch_full_content,
        }
    }

    /// Sync one account's feed into the store.
    ///
    /// Incremental mode (`full_sync = false`) skips already-seen URLs and
    /// caps the batch at the configured maximum; full sync processes every
    /// entry and overwrites existing rows' content fields. One `SyncRun`
    /// record is opened at entry and finalized exactly once. A per-entry
    /// failure is counted and logged but never aborts the batch.
    pub async fn sync_account(
        &self,
        feed_id: &str,
        kind: SyncKind,
        full_sync: bool,
    ) -> SyncOutcome {
        tracing::info!(feed_id = %feed_id, kind = kind.as_str(), full_sync, "Starting sync");

        let account = match self.db.get_account_by_feed_id(feed_id).await {
            Ok(Some(account)) => account,
            Ok(None) => match self.create_account_from_feed(feed_id).await {
                Ok(account) => account,
                Err(error) => return SyncOutcome::Failed { error },
            },
            Err(e) => {
                return SyncOutcome::Failed {
                    error: format!("Account lookup failed: {e}"),
                }
            }
        };

        let run = match self.db.create_sync_run(Some(account.id), kind).await {
            Ok(run) => run,
            Err(e) => {
                return SyncOutcome::Failed {
                    error: format!("Failed to record sync run: {e}"),
                }
            }
        };

        let limit = if full_sync {
            None
        } else {
            Some(self.max_articles_per_sync)
        };
        let entries = match self.feeds.get_feed_entries(feed_id, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                let error = format!("Feed fetch failed: {e}");
                tracing::error!(feed_id = %feed_id, error = %error, "Sync failed");
                if let Err(db_err) = self
                    .db
                    .finalize_sync_run(run.id, SyncStatus::Failed, RunCounts::default(), Some(&error))
                    .await
                {
                    tracing::warn!(run_id = run.id, error = %db_err, "Failed to finalize sync run");
                }
                return SyncOutcome::Failed { error };
            }
        };

        let mut stats = SyncStats {
            fetched: entries.len(),
            ..SyncStats::default()
        };

        for entry in &entries {
            self.ingest_entry(&account, entry, full_sync, &mut stats)
                .await;
        }

        if let Err(e) = self
            .db
            .finalize_sync_run(run.id, SyncStatus::Success, stats.run_counts(), None)
            .await
        {
            tracing::warn!(run_id = run.id, error = %e, "Failed to finalize sync run");
        }

        tracing::info!(
            feed_id = %feed_id,
            new = stats.new,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            "Sync completed"
        );

        SyncOutcome::Completed {
            account: account.name,
            stats,
        }
    }

    /// Sync every active account in turn, summing results.
    ///
    /// One account's failure never stops the others.
    pub async fn sync_all_accounts(&self, kind: SyncKind) -> SyncReport {
        tracing::info!("Starting sync for all accounts");

        let accounts = match self.db.get_accounts(true).await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list accounts");
                return SyncReport::default();
            }
        };

        if accounts.is_empty() {
            tracing::warn!("No active accounts found");
            return SyncReport::default();
        }

        let mut report = SyncReport {
            total_accounts: accounts.len(),
            ..SyncReport::default()
        };

        for account in accounts {
            let outcome = self.sync_account(&account.feed_id, kind, false).await;
            if let Some(stats) = outcome.stats() {
                report.total_new += stats.new;
                report.total_updated += stats.updated;
                report.total_failed += stats.failed;
            }
            report.results.push(AccountSyncResult {
                feed_id: account.feed_id,
                account: account.name,
                outcome,
            });
        }

        tracing::info!(
            accounts = report.total_accounts,
            new = report.total_new,
            updated = report.total_updated,
            failed = report.total_failed,
            "Sync all completed"
        );

        report
    }

    /// Register a new account to track, optionally running a first full
    /// sync to backfill its articles.
    pub async fn add_account(
        &self,
        feed_id: &str,
        name: Option<&str>,
        initial_sync: bool,
    ) -> AddAccountOutcome {
        tracing::info!(feed_id = %feed_id, "Adding account");

        match self.db.get_account_by_feed_id(feed_id).await {
            Ok(Some(_)) => {
                tracing::warn!(feed_id = %feed_id, "Account already exists");
                return AddAccountOutcome::AlreadyExists;
            }
            Ok(None) => {}
            Err(e) => {
                return AddAccountOutcome::Failed {
                    error: format!("Account lookup failed: {e}"),
                }
            }
        }

        let account = match self.create_account_from_feed(feed_id).await {
            Ok(mut account) => {
                if let Some(name) = name {
                    if let Err(e) = self
                        .db
                        .update_account_profile(account.id, name, account.description.as_deref())
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to apply custom account name");
                    } else {
                        account.name = name.to_string();
                    }
                }
                account
            }
            Err(error) => return AddAccountOutcome::Failed { error },
        };

        let initial = if initial_sync {
            Some(
                self.sync_account(feed_id, SyncKind::Manual, true)
                    .await,
            )
        } else {
            None
        };

        AddAccountOutcome::Added {
            account: account.name,
            initial_sync: initial,
        }
    }

    /// Lazily create an account, seeding its profile from the feed.
    async fn create_account_from_feed(&self, feed_id: &str) -> Result<Account, String> {
        tracing::info!(feed_id = %feed_id, "Account not found, creating from feed");

        let document = self
            .feeds
            .fetch_feed(feed_id, FeedFormat::Json)
            .await
            .map_err(|e| format!("Failed to fetch feed data: {e}"))?;

        let name = document
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(feed_id);
        let feed_url = self.feeds.feed_url(feed_id, FeedFormat::Json);

        self.db
            .create_account(feed_id, name, &feed_url, document.description.as_deref())
            .await
            .map_err(|e| format!("Failed to create account: {e}"))
    }

    /// Process and persist a single feed entry, updating `stats`.
    async fn ingest_entry(
        &self,
        account: &Account,
        entry: &crate::client::FeedEntry,
        full_sync: bool,
        stats: &mut SyncStats,
    ) {
        let draft = self
            .processor
            .process_article(entry, self.fetch_full_content)
            .await;

        if draft.url.is_empty() {
            tracing::warn!(title = %draft.title, "Entry has no URL, cannot deduplicate");
            stats.failed += 1;
            return;
        }

        // An entry whose author could not be resolved carries the account
        // display name instead of a placeholder
        let record = to_new_article(account, draft);

        let article_id = match self.db.get_article_by_url(&record.url).await {
            Err(e) => {
                tracing::error!(url = %record.url, error = %e, "Article lookup failed");
                stats.failed += 1;
                return;
            }
            Ok(Some(_)) if !full_sync => {
                stats.skipped += 1;
                return;
            }
            Ok(Some(existing)) => match self.db.update_article_content(existing.id, &record).await
            {
                Ok(()) => {
                    tracing::debug!(id = existing.id, title = %record.title, "Updated article");
                    stats.updated += 1;
                    existing.id
                }
                Err(e) => {
                    tracing::error!(url = %record.url, error = %e, "Article update failed");
                    stats.failed += 1;
                    return;
                }
            },
            Ok(None) => match self.db.insert_article(&record).await {
                Ok(id) => {
                    tracing::debug!(id, title = %record.title, "Created article");
                    stats.new += 1;
                    id
                }
                Err(e) => {
                    tracing::error!(url = %record.url, error = %e, "Article insert failed");
                    stats.failed += 1;
                    return;
                }
            },
        };

        // Metrics and scoring are a sub-step: a failure here is counted
        // but the insert/update above stands
        let metrics = self.metrics.fetch_article_metrics(&record.url).await;
        let scores = compute_scores(&metrics);
        if let Err(e) = self.db.apply_metrics(article_id, &metrics, &scores).await {
            tracing::error!(id = article_id, error = %e, "Failed to persist metrics");
            stats.failed += 1;
        }
    }
}

/// Fold a processed draft into the storage payload, applying the
/// account-name author fallback.
fn to_new_article(account: &Account, draft: ArticleDraft) -> NewArticle {
    NewArticle {
        account_id: account.id,
        author: Some(draft.author.unwrap_or_else(|| account.name.clone())),
        title: draft.title,
        url: draft.url,
        guid: if draft.guid.is_empty() {
            None
        } else {
            Some(draft.guid)
        },
        content: draft.content_text,
        content_html: if draft.content_html.is_empty() {
            None
        } else {
            Some(draft.content_html)
        },
        summary: if draft.summary.is_empty() {
            None
        } else {
            Some(draft.summary)
        },
        cover_image: draft.cover_image,
        images: draft.images,
        videos: draft.videos,
        published_at: draft.published_at,
        word_count: draft.word_count,
        reading_time_minutes: draft.reading_time_minutes,
    }
}
