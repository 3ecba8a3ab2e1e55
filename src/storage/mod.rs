//! Storage boundaries: the durable trending store and the dedup cache.
//!
//! The store is authoritative; the cache is a write-through acceleration
//! layer that only spares redundant acceptance checks inside a bucket's TTL
//! window. Pipeline code programs against the traits here and receives
//! concrete backends at construction.

pub mod postgres;
pub mod redis;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Repository, StoredTrending, TrendingRecord, Window};

// Re-export for convenience
pub use self::postgres::PostgresStore;
pub use self::redis::RedisCache;

/// Namespace prefix for all dedup cache keys.
const CACHE_PREFIX: &str = "trending";

/// Composite cache key scoping one category's counts to a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub window: Window,
    pub category: String,
    pub bucket_date: NaiveDate,
}

impl CacheKey {
    pub fn new(window: Window, category: impl Into<String>, bucket_date: NaiveDate) -> Self {
        Self {
            window,
            category: category.into(),
            bucket_date,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CACHE_PREFIX}_{}_{}_{}",
            self.window, self.category, self.bucket_date
        )
    }
}

/// Durable store for trending rows.
#[async_trait]
pub trait TrendingStore: Send + Sync {
    /// Snapshot of non-deleted rows for one bucket, across all categories.
    ///
    /// Read once per run, before any mutation from the same run is applied.
    async fn load_bucket(
        &self,
        bucket_date: NaiveDate,
        window: Window,
    ) -> Result<Vec<StoredTrending>>;

    /// Idempotent bulk upsert keyed by (date, since, language, repository).
    ///
    /// Retrying the same batch after a mid-batch failure must yield the same
    /// final row set as a single successful application.
    async fn upsert_batch(&self, records: &[TrendingRecord]) -> Result<()>;
}

/// Durable store for hydrated repository metadata.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Bulk upsert keyed by unique `full_name`.
    async fn upsert_repositories(&self, repositories: &[Repository]) -> Result<()>;
}

/// Bounded-lifetime cache of last-accepted counts per bucket key.
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Read all counts under a key. A missing key yields an empty map.
    async fn read_counts(&self, key: &CacheKey) -> Result<HashMap<String, i64>>;

    /// Write-through accepted counts and set the window expiry.
    ///
    /// An entry whose expiry cannot be set is logged, not failed: it only
    /// degrades future dedup freshness.
    async fn write_counts(
        &self,
        key: &CacheKey,
        counts: &HashMap<String, i64>,
        ttl: Duration,
    ) -> Result<()>;
}
