// src/pipeline/hydrate.rs

//! Repository metadata hydration pipeline.
//!
//! Walks each category's cached identifier set for the current bucket and
//! fetches full repository metadata from the catalog API. Unlike the
//! trending run, the cache is this task's input source, so a cache read
//! failure is fatal rather than a degraded snapshot.

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, Window};
use crate::pipeline::CancelFlag;
use crate::services::MetadataFetcher;
use crate::storage::{CacheKey, DedupCache, RepositoryStore};

/// Aggregated result of one hydration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrateSummary {
    /// Categories that had cached identifiers and were hydrated
    pub categories: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub cancelled: bool,
}

/// Run metadata hydration for one window.
pub async fn run_hydration(
    config: &Config,
    fetcher: &dyn MetadataFetcher,
    store: &dyn RepositoryStore,
    cache: &dyn DedupCache,
    window: Window,
    cancel: &CancelFlag,
) -> Result<HydrateSummary> {
    let bucket_date = window.bucket_date(Utc::now());
    let concurrency = config.crawler.max_concurrent.max(1);
    let mut summary = HydrateSummary::default();

    log::info!("starting hydration run: window={window} bucket={bucket_date}");

    for category in &config.crawler.categories {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            log::warn!("cancellation requested, stopping before category {category}");
            break;
        }

        let key = CacheKey::new(window, category.clone(), bucket_date);
        let counts = cache.read_counts(&key).await?;
        if counts.is_empty() {
            log::warn!("no cached identifiers under {key}, skipping category {category}");
            continue;
        }

        let mut names: Vec<String> = counts.into_keys().collect();
        names.sort();

        let total = names.len();
        let mut fetched = Vec::with_capacity(total);
        let mut results = stream::iter(names)
            .map(|full_name| async move {
                let result = fetcher.fetch(&full_name).await;
                (full_name, result)
            })
            .buffer_unordered(concurrency);

        while let Some((full_name, result)) = results.next().await {
            match result {
                Ok(repository) => fetched.push(repository),
                Err(error) => {
                    summary.fetch_failures += 1;
                    log::warn!("failed to fetch metadata for {full_name}: {error}");
                }
            }
        }

        store.upsert_repositories(&fetched).await?;
        summary.categories += 1;
        summary.fetched += fetched.len();
        log::info!(
            "category {category}: hydrated {} of {total} repositories",
            fetched.len()
        );
    }

    log::info!(
        "hydration run finished: {} repositories across {} categories",
        summary.fetched,
        summary.categories
    );
    Ok(summary)
}
