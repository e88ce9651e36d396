use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pulsefeed::client::FeedClient;
use pulsefeed::config::Config;
use pulsefeed::content::{ContentFetcher, ContentProcessor};
use pulsefeed::metrics::MetricsFetcher;
use pulsefeed::storage::{ArticleSort, Database, SyncKind};
use pulsefeed::sync::{AddAccountOutcome, SyncManager, SyncOutcome};

#[derive(Parser, Debug)]
#[command(name = "pulsefeed", about = "Feed ingestion and popularity-scoring pipeline")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "pulsefeed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync one account's feed
    Sync {
        /// Feed identifier of the account
        feed_id: String,
        /// Re-process every entry, overwriting stored content
        #[arg(long)]
        full: bool,
    },
    /// Sync every active account
    SyncAll,
    /// Register a new account and backfill its articles
    Add {
        /// Feed identifier of the account
        feed_id: String,
        /// Display name (defaults to the feed title)
        #[arg(long)]
        name: Option<String>,
        /// Skip the initial full sync
        #[arg(long)]
        no_sync: bool,
    },
    /// Deactivate an account (its articles are kept)
    Remove {
        /// Feed identifier of the account
        feed_id: String,
    },
    /// Show store statistics and top articles by heat score
    Status,
    /// Probe the aggregator base URL
    TestConnection,
}

fn build_manager(config: &Config, db: Database) -> SyncManager {
    let feeds = FeedClient::new(
        &config.aggregator_url,
        config.auth_code.clone(),
        config.max_requests_per_minute,
        Duration::from_secs(config.feed_cache_ttl_minutes * 60),
    );
    let fetcher = ContentFetcher::new(
        &config.content_referer,
        Duration::from_secs(config.content_fetch_delay_secs),
        Duration::from_secs(config.content_cache_ttl_hours * 3600),
    );
    let processor = ContentProcessor::new(fetcher);
    let metrics = MetricsFetcher::new(&config.metrics_endpoint, config.metrics_api_key.clone());

    SyncManager::new(
        db,
        feeds,
        processor,
        metrics,
        config.max_articles_per_sync,
        config.fetch_full_content,
    )
}

fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed { account, stats } => {
            println!(
                "{}: {} fetched, {} new, {} updated, {} skipped, {} failed",
                account, stats.fetched, stats.new, stats.updated, stats.skipped, stats.failed
            );
        }
        SyncOutcome::Failed { error } => {
            eprintln!("Sync failed: {}", error);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("Failed to load configuration")?;

    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
    }
    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let manager = build_manager(&config, db.clone());

    match args.command {
        Command::Sync { feed_id, full } => {
            let outcome = manager.sync_account(&feed_id, SyncKind::Manual, full).await;
            print_outcome(&outcome);
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Command::SyncAll => {
            let report = manager.sync_all_accounts(SyncKind::Manual).await;
            for result in &report.results {
                print_outcome(&result.outcome);
            }
            println!(
                "{} accounts: {} new, {} updated, {} failed",
                report.total_accounts, report.total_new, report.total_updated, report.total_failed
            );
        }
        Command::Add {
            feed_id,
            name,
            no_sync,
        } => match manager.add_account(&feed_id, name.as_deref(), !no_sync).await {
            AddAccountOutcome::Added {
                account,
                initial_sync,
            } => {
                println!("Added account: {}", account);
                if let Some(outcome) = initial_sync {
                    print_outcome(&outcome);
                }
            }
            AddAccountOutcome::AlreadyExists => {
                eprintln!("Account already exists: {}", feed_id);
                std::process::exit(1);
            }
            AddAccountOutcome::Failed { error } => {
                eprintln!("Failed to add account: {}", error);
                std::process::exit(1);
            }
        },
        Command::Remove { feed_id } => {
            let removed = db
                .set_account_active(&feed_id, false)
                .await
                .context("Failed to deactivate account")?;
            if removed {
                println!("Deactivated account: {}", feed_id);
            } else {
                eprintln!("No such account: {}", feed_id);
                std::process::exit(1);
            }
        }
        Command::Status => {
            let stats = db.store_stats().await.context("Failed to read store stats")?;
            println!(
                "Accounts: {} ({} active), Articles: {}, Sync runs: {}",
                stats.total_accounts,
                stats.active_accounts,
                stats.total_articles,
                stats.total_sync_runs
            );

            let top = db
                .get_recent_articles(10, ArticleSort::HeatScore)
                .await
                .context("Failed to list articles")?;
            for article in top {
                println!(
                    "  [{:8.1}] {} ({})",
                    article.heat_score,
                    article.title,
                    article.author.as_deref().unwrap_or("-")
                );
            }

            if let Some(run) = db
                .get_latest_sync_run(None)
                .await
                .context("Failed to read sync history")?
            {
                println!(
                    "Last run: {} ({}: {} new, {} updated, {} failed)",
                    run.status.as_str(),
                    run.kind,
                    run.new,
                    run.updated,
                    run.failed
                );
            }
        }
        Command::TestConnection => {
            let feeds = FeedClient::new(
                &config.aggregator_url,
                config.auth_code.clone(),
                config.max_requests_per_minute,
                Duration::from_secs(config.feed_cache_ttl_minutes * 60),
            );
            if feeds.test_connection().await {
                println!("Connection OK: {}", config.aggregator_url);
            } else {
                eprintln!("Connection failed: {}", config.aggregator_url);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
