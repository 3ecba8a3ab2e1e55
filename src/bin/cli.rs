//! trendwatch CLI
//!
//! One finite harvest run per invocation; meant to be driven by a
//! scheduler. Fatal conditions map to distinct exit codes so the scheduler
//! can tell a broken deployment from an upstream outage.

use std::path::PathBuf;

use clap::Parser;
use trendwatch::{
    config,
    error::{AppError, Result},
    models::Window,
    pipeline::{self, CancelFlag},
    services::{GithubFetcher, OpenObserveSink, TrendingPageExtractor},
    storage::{PostgresStore, RedisCache},
    utils::http,
};

/// trendwatch - trending repository harvester
#[derive(Parser, Debug)]
#[command(name = "trendwatch", version, about = "Trending repository harvester")]
struct Cli {
    /// Task to run: collect trending listings, hydrate repository
    /// metadata, or bootstrap the database schema
    /// (trending/repo/init_db)
    #[arg(long, default_value = "trending")]
    task: String,

    /// Observation window: daily, weekly, or monthly
    #[arg(long, default_value = "daily")]
    since: String,

    /// Path to the TOML config file; environment variables are used when
    /// the file does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(error) = run(cli).await {
        log::error!("{error}");
        std::process::exit(error.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load(&cli.config)?;
    config.validate()?;

    let window: Window = cli.since.parse()?;
    let client = http::create_client(&config.crawler)?;

    // Cooperative cancellation: an interrupt abandons work at the next
    // category boundary instead of tearing down mid-batch.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt received, finishing the current category");
                cancel.cancel();
            }
        });
    }

    match cli.task.as_str() {
        "trending" => {
            log::info!("running trending task, window {window}");
            let store = PostgresStore::connect(&config.database).await?;
            let cache = RedisCache::connect(&config.redis).await?;
            let sink = OpenObserveSink::new(client.clone(), &config.openobserve);
            let extractor = TrendingPageExtractor::new(client, &config.crawler)?;

            let summary = pipeline::run_trending(
                &config, &extractor, &store, &cache, &sink, window, &cancel,
            )
            .await?;
            log::info!(
                "trending run complete: {} categories, {} created, {} updated, {} skipped",
                summary.categories,
                summary.created,
                summary.updated,
                summary.skipped
            );
        }
        "repo" => {
            log::info!("running repository hydration task, window {window}");
            let store = PostgresStore::connect(&config.database).await?;
            let cache = RedisCache::connect(&config.redis).await?;
            let fetcher = GithubFetcher::new(client, &config.github)?;

            let summary =
                pipeline::run_hydration(&config, &fetcher, &store, &cache, window, &cancel)
                    .await?;
            log::info!(
                "hydration complete: {} repositories across {} categories",
                summary.fetched,
                summary.categories
            );
        }
        "init_db" => {
            let store = PostgresStore::connect(&config.database).await?;
            store.init_schema().await?;
            log::info!("database schema is ready");
        }
        other => return Err(AppError::config(format!("unknown task type: {other}"))),
    }

    Ok(())
}
