// src/pipeline/trending.rs

//! Trending harvest pipeline.
//!
//! One run is a finite batch job: extract every category first, take one
//! durable snapshot for the bucket, then reconcile, persist, and emit per
//! category in the deterministic config order. Categories are independent;
//! a failure in one never rolls back another.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, RankedPair, StoredTrending, Window};
use crate::pipeline::reconcile::bucket_key;
use crate::pipeline::{CancelFlag, ChangeEmitter, Persister, Reconciler};
use crate::services::{EventSink, ListExtractor};
use crate::storage::{CacheKey, DedupCache, TrendingStore};

/// Aggregated result of one trending run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub window: Window,
    pub bucket_date: NaiveDate,
    /// Categories that produced a non-empty listing and were processed
    pub categories: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub extraction_failures: usize,
    pub store_failures: usize,
    pub cache_failures: usize,
    pub sink_failures: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn new(window: Window, bucket_date: NaiveDate) -> Self {
        Self {
            window,
            bucket_date,
            categories: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            malformed: 0,
            extraction_failures: 0,
            store_failures: 0,
            cache_failures: 0,
            sink_failures: 0,
            cancelled: false,
        }
    }
}

/// Run the trending harvest for one window.
pub async fn run_trending(
    config: &Config,
    extractor: &dyn ListExtractor,
    store: &dyn TrendingStore,
    cache: &dyn DedupCache,
    sink: &dyn EventSink,
    window: Window,
    cancel: &CancelFlag,
) -> Result<RunSummary> {
    let bucket_date = window.bucket_date(Utc::now());
    let mut summary = RunSummary::new(window, bucket_date);
    log::info!("starting trending run: window={window} bucket={bucket_date}");

    // Stage 1: extract every category before touching cache or store.
    // One bad category must not abort its siblings.
    let delay = Duration::from_millis(config.crawler.request_delay_ms);
    let mut listings: Vec<(String, Vec<RankedPair>)> = Vec::new();
    for category in &config.crawler.categories {
        match extractor.fetch(category, window).await {
            Ok(pairs) if pairs.is_empty() => {
                log::warn!("category {category}: listing came back empty");
            }
            Ok(pairs) => listings.push((category.clone(), pairs)),
            Err(error) => {
                summary.extraction_failures += 1;
                log::error!("category {category}: extraction failed: {error}");
            }
        }

        if delay.as_millis() > 0 {
            tokio::time::sleep(delay).await;
        }
    }

    if listings.is_empty() {
        return Err(AppError::no_data(format!(
            "all {} categories returned no rankings",
            config.crawler.categories.len()
        )));
    }

    // One snapshot of the bucket's durable rows, taken before any write
    // from this run, keyed category:identifier.
    let existing: HashMap<String, StoredTrending> = store
        .load_bucket(bucket_date, window)
        .await?
        .into_iter()
        .map(|row| (bucket_key(&row.language, &row.repository), row))
        .collect();

    let reconciler = Reconciler::new(bucket_date, window, &existing);
    let persister = Persister::new(store, cache);
    let emitter = ChangeEmitter::new(sink);

    for (category, pairs) in &listings {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            log::warn!("cancellation requested, stopping before category {category}");
            break;
        }

        let key = CacheKey::new(window, category.clone(), bucket_date);
        let cached = match cache.read_counts(&key).await {
            Ok(counts) => counts,
            Err(error) => {
                // Degraded dedup only: the store stays authoritative, so an
                // unreadable snapshot means re-accepting, never corrupting.
                summary.cache_failures += 1;
                log::warn!("cache read failed for {key}: {error}, proceeding without snapshot");
                HashMap::new()
            }
        };

        let mut batch = reconciler.reconcile(category, pairs, &cached);
        summary.created += batch.stats.created;
        summary.updated += batch.stats.updated;
        summary.skipped += batch.stats.skipped;
        summary.malformed += batch.stats.malformed;
        summary.categories += 1;

        if batch.is_empty() {
            log::info!("category {category}: nothing accepted this pass");
            continue;
        }

        let outcome = persister.apply(&batch, &key, window.cache_ttl()).await;
        if !outcome.store_ok() {
            summary.store_failures += 1;
        }
        if outcome.cache_error.is_some() {
            summary.cache_failures += 1;
        }

        match emitter.emit(&mut batch.events).await {
            Ok(sent) => {
                log::info!(
                    "category {category}: {} created, {} updated, {sent} events emitted",
                    batch.stats.created,
                    batch.stats.updated
                );
            }
            Err(error) => {
                summary.sink_failures += 1;
                log::warn!(
                    "category {category}: event delivery failed ({} events dropped): {error}",
                    batch.events.len()
                );
            }
        }
    }

    log::info!(
        "trending run finished: {} categories, {} created, {} updated, {} skipped, {} malformed",
        summary.categories,
        summary.created,
        summary.updated,
        summary.skipped,
        summary.malformed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::models::{ChangeAction, ChangeEvent, TrendingRecord};

    struct StaticExtractor {
        lists: HashMap<String, Vec<RankedPair>>,
        failing: HashSet<String>,
    }

    impl StaticExtractor {
        fn new(lists: &[(&str, &[(&str, &str)])]) -> Self {
            let lists = lists
                .iter()
                .map(|(category, pairs)| {
                    (
                        category.to_string(),
                        pairs
                            .iter()
                            .map(|(repository, stars)| RankedPair::new(*repository, *stars))
                            .collect(),
                    )
                })
                .collect();
            Self {
                lists,
                failing: HashSet::new(),
            }
        }

        fn failing(mut self, category: &str) -> Self {
            self.failing.insert(category.to_string());
            self
        }
    }

    #[async_trait]
    impl ListExtractor for StaticExtractor {
        async fn fetch(&self, category: &str, _window: Window) -> Result<Vec<RankedPair>> {
            if self.failing.contains(category) {
                return Err(AppError::extract(category, "listing returned 502"));
            }
            Ok(self.lists.get(category).cloned().unwrap_or_default())
        }
    }

    /// In-memory store with real upsert semantics keyed by the bucket
    /// uniqueness tuple.
    #[derive(Default)]
    struct MemoryStore {
        fail_upserts: bool,
        rows: Mutex<HashMap<(NaiveDate, Window, String, String), (i64, i64)>>,
        next_id: Mutex<i64>,
    }

    impl MemoryStore {
        fn stars(&self, category: &str, repository: &str) -> Option<i64> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|((_, _, language, repo), _)| language == category && repo == repository)
                .map(|(_, (_, stars))| *stars)
        }

        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TrendingStore for MemoryStore {
        async fn load_bucket(
            &self,
            bucket_date: NaiveDate,
            window: Window,
        ) -> Result<Vec<StoredTrending>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|((date, since, _, _), _)| *date == bucket_date && *since == window)
                .map(|((_, _, language, repository), (id, _))| StoredTrending {
                    id: *id,
                    repository: repository.clone(),
                    language: language.clone(),
                })
                .collect())
        }

        async fn upsert_batch(&self, records: &[TrendingRecord]) -> Result<()> {
            if self.fail_upserts {
                return Err(AppError::config("store down"));
            }
            let mut rows = self.rows.lock().unwrap();
            for record in records {
                let key = (
                    record.date,
                    record.since,
                    record.language.clone(),
                    record.repository.clone(),
                );
                if let Some((_, stars)) = rows.get_mut(&key) {
                    *stars = record.stars;
                } else {
                    let mut next_id = self.next_id.lock().unwrap();
                    *next_id += 1;
                    rows.insert(key, (*next_id, record.stars));
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        fail_reads: bool,
        maps: Mutex<HashMap<String, HashMap<String, i64>>>,
    }

    impl MemoryCache {
        fn counts_for(&self, category: &str) -> HashMap<String, i64> {
            let maps = self.maps.lock().unwrap();
            maps.iter()
                .find(|(key, _)| key.contains(&format!("_{category}_")))
                .map(|(_, counts)| counts.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl DedupCache for MemoryCache {
        async fn read_counts(&self, key: &CacheKey) -> Result<HashMap<String, i64>> {
            if self.fail_reads {
                return Err(AppError::config("cache down"));
            }
            Ok(self
                .maps
                .lock()
                .unwrap()
                .get(&key.to_string())
                .cloned()
                .unwrap_or_default())
        }

        async fn write_counts(
            &self,
            key: &CacheKey,
            counts: &HashMap<String, i64>,
            _ttl: Duration,
        ) -> Result<()> {
            self.maps
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .extend(counts.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        batches: Mutex<Vec<Vec<ChangeEvent>>>,
    }

    impl CollectingSink {
        fn all_events(&self) -> Vec<ChangeEvent> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn deliver(&self, events: &[ChangeEvent]) -> Result<()> {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }
    }

    fn test_config(categories: &[&str]) -> Config {
        let mut config = Config::default();
        config.crawler.categories = categories.iter().map(|c| c.to_string()).collect();
        config.crawler.request_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn fresh_run_creates_rows_caches_counts_and_emits() {
        let config = test_config(&["go"]);
        let extractor = StaticExtractor::new(&[("go", &[("repoA", "50"), ("repoB", "30")])]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let summary = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.categories, 1);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated, 0);
        assert_eq!(store.row_count(), 2);
        assert_eq!(store.stars("go", "repoA"), Some(50));

        let counts = cache.counts_for("go");
        assert_eq!(counts.get("repoA"), Some(&50));
        assert_eq!(counts.get("repoB"), Some(&30));

        let events = sink.all_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == ChangeAction::Create));
        assert!(events.iter().all(|e| e.time.is_some() && e.timestamp.is_some()));
    }

    #[tokio::test]
    async fn lower_reobservation_changes_nothing() {
        let config = test_config(&["go"]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();

        let first = StaticExtractor::new(&[("go", &[("repoA", "50")])]);
        let sink = CollectingSink::default();
        run_trending(
            &config,
            &first,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        let second = StaticExtractor::new(&[("go", &[("repoA", "45")])]);
        let sink = CollectingSink::default();
        let summary = run_trending(
            &config,
            &second,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.created + summary.updated, 0);
        assert_eq!(store.stars("go", "repoA"), Some(50));
        assert!(sink.all_events().is_empty());
    }

    #[tokio::test]
    async fn reobservation_within_bucket_becomes_update_with_row_id() {
        let config = test_config(&["go"]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();

        let first = StaticExtractor::new(&[("go", &[("repoA", "50")])]);
        run_trending(
            &config,
            &first,
            &store,
            &cache,
            &CollectingSink::default(),
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        let second = StaticExtractor::new(&[("go", &[("repoA", "62")])]);
        let sink = CollectingSink::default();
        let summary = run_trending(
            &config,
            &second,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(store.row_count(), 1);
        assert_eq!(store.stars("go", "repoA"), Some(62));

        let events = sink.all_events();
        assert_eq!(events[0].action, ChangeAction::Update);
        assert!(events[0].repo_id.is_some());
    }

    #[tokio::test]
    async fn applying_the_same_listing_twice_is_idempotent() {
        let config = test_config(&["go"]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();

        for _ in 0..2 {
            let extractor = StaticExtractor::new(&[("go", &[("repoA", "50"), ("repoB", "30")])]);
            run_trending(
                &config,
                &extractor,
                &store,
                &cache,
                &CollectingSink::default(),
                Window::Daily,
                &CancelFlag::new(),
            )
            .await
            .unwrap();
        }

        assert_eq!(store.row_count(), 2);
        assert_eq!(store.stars("go", "repoA"), Some(50));
        assert_eq!(store.stars("go", "repoB"), Some(30));
    }

    #[tokio::test]
    async fn malformed_pair_skips_only_itself() {
        let config = test_config(&["go"]);
        let extractor = StaticExtractor::new(&[(
            "go",
            &[("repoA", "50"), ("repoB", "N/A"), ("repoC", "30")],
        )]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let summary = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.created, 2);
        assert_eq!(store.row_count(), 2);
        assert!(store.stars("go", "repoB").is_none());
    }

    #[tokio::test]
    async fn all_empty_categories_is_fatal() {
        let config = test_config(&["go", "rust"]);
        let extractor = StaticExtractor::new(&[]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let error = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AppError::NoData(_)));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn one_failing_category_does_not_abort_siblings() {
        let config = test_config(&["go", "rust"]);
        let extractor =
            StaticExtractor::new(&[("rust", &[("rust-lang/rust", "98000")])]).failing("go");
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let summary = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.extraction_failures, 1);
        assert_eq!(summary.categories, 1);
        assert_eq!(store.stars("rust", "rust-lang/rust"), Some(98_000));
    }

    #[tokio::test]
    async fn store_failure_still_emits_and_run_continues() {
        let config = test_config(&["go", "rust"]);
        let extractor = StaticExtractor::new(&[
            ("go", &[("repoA", "50")]),
            ("rust", &[("rust-lang/rust", "98000")]),
        ]);
        let store = MemoryStore {
            fail_upserts: true,
            ..MemoryStore::default()
        };
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let summary = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.store_failures, 2);
        assert_eq!(summary.categories, 2);
        // Emission observes accepted changes; it is not transactional
        assert_eq!(sink.all_events().len(), 2);
    }

    #[tokio::test]
    async fn cache_read_failure_degrades_to_empty_snapshot() {
        let config = test_config(&["go"]);
        let extractor = StaticExtractor::new(&[("go", &[("repoA", "50")])]);
        let store = MemoryStore::default();
        let cache = MemoryCache {
            fail_reads: true,
            ..MemoryCache::default()
        };
        let sink = CollectingSink::default();

        let summary = run_trending(
            &config,
            &extractor,
            &store,
            &cache,
            &sink,
            Window::Daily,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert!(summary.cache_failures >= 1);
        assert_eq!(summary.created, 1);
        assert_eq!(store.stars("go", "repoA"), Some(50));
    }

    #[tokio::test]
    async fn cancellation_stops_at_category_boundary() {
        let config = test_config(&["go"]);
        let extractor = StaticExtractor::new(&[("go", &[("repoA", "50")])]);
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let sink = CollectingSink::default();

        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = run_trending(
            &config, &extractor, &store, &cache, &sink, Window::Daily, &cancel,
        )
        .await
        .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.categories, 0);
        assert_eq!(store.row_count(), 0);
        assert!(sink.all_events().is_empty());
    }
}
