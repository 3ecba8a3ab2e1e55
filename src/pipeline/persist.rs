//! Batch persistence: durable upsert plus cache write-through.

use std::time::Duration;

use crate::error::AppError;
use crate::pipeline::reconcile::CategoryBatch;
use crate::storage::{CacheKey, DedupCache, TrendingStore};

/// Per-side outcome of applying one category batch.
///
/// The store and the cache are attempted independently: the store is
/// authoritative, the cache is an acceleration layer, and a failure on one
/// side never suppresses the attempt on the other.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub stored: usize,
    pub cached: usize,
    pub store_error: Option<AppError>,
    pub cache_error: Option<AppError>,
}

impl PersistOutcome {
    /// Whether the authoritative write went through. Only a store failure
    /// fails the category.
    pub fn store_ok(&self) -> bool {
        self.store_error.is_none()
    }
}

/// Applies reconciled batches to the durable store and the dedup cache.
pub struct Persister<'a> {
    store: &'a dyn TrendingStore,
    cache: &'a dyn DedupCache,
}

impl<'a> Persister<'a> {
    pub fn new(store: &'a dyn TrendingStore, cache: &'a dyn DedupCache) -> Self {
        Self { store, cache }
    }

    /// Apply one category's batch: upsert the records, then write the
    /// accepted counts through to the cache with the window expiry.
    pub async fn apply(
        &self,
        batch: &CategoryBatch,
        key: &CacheKey,
        ttl: Duration,
    ) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        if batch.is_empty() {
            return outcome;
        }

        match self.store.upsert_batch(&batch.records).await {
            Ok(()) => outcome.stored = batch.records.len(),
            Err(error) => {
                log::error!(
                    "store upsert of {} rows failed for category {}: {error}",
                    batch.records.len(),
                    batch.category
                );
                outcome.store_error = Some(error);
            }
        }

        match self.cache.write_counts(key, &batch.accepted, ttl).await {
            Ok(()) => outcome.cached = batch.accepted.len(),
            Err(error) => {
                log::warn!(
                    "cache write of {} counts failed for key {key}: {error}",
                    batch.accepted.len()
                );
                outcome.cache_error = Some(error);
            }
        }

        outcome
    }
}
