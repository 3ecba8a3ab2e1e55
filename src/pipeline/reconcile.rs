//! Reconciliation of fresh rankings against cache and store snapshots.
//!
//! The reconciler decides, pair by pair, whether a freshly scraped star
//! count is worth recording. Counts only grow within a bucket, so a value
//! below the cached one is transient scrape noise and is discarded; a value
//! at or above it is accepted and the last accepted value wins.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    ChangeAction, ChangeEvent, RankedPair, StoredTrending, TrendingRecord, Window,
};

/// Counters for one category's reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub malformed: usize,
}

/// Output of one category's reconciliation: parallel store and event
/// batches, plus the accepted counts destined for the cache.
#[derive(Debug, Default)]
pub struct CategoryBatch {
    pub category: String,
    pub records: Vec<TrendingRecord>,
    pub events: Vec<ChangeEvent>,
    pub accepted: HashMap<String, i64>,
    pub stats: ReconcileStats,
}

impl CategoryBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Diffing engine for one pipeline run.
///
/// Holds the read-before-write snapshots taken at the start of the run, so
/// reconciliation never compares a pair against a value the same run just
/// wrote.
pub struct Reconciler<'a> {
    bucket_date: NaiveDate,
    window: Window,
    /// Existing durable rows for the bucket, keyed `category:identifier`
    existing: &'a HashMap<String, StoredTrending>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        bucket_date: NaiveDate,
        window: Window,
        existing: &'a HashMap<String, StoredTrending>,
    ) -> Self {
        Self {
            bucket_date,
            window,
            existing,
        }
    }

    /// Reconcile one category's ranked pairs against the snapshots.
    pub fn reconcile(
        &self,
        category: &str,
        pairs: &[RankedPair],
        cached: &HashMap<String, i64>,
    ) -> CategoryBatch {
        let mut batch = CategoryBatch {
            category: category.to_string(),
            ..CategoryBatch::default()
        };

        for (repository, raw_stars) in dedup_last_wins(pairs) {
            let stars = match raw_stars.trim().parse::<i64>() {
                Ok(value) if value >= 0 => value,
                Ok(value) => {
                    log::warn!(
                        "category {category}: negative star count {value} for {repository}, skipping pair"
                    );
                    batch.stats.malformed += 1;
                    continue;
                }
                Err(error) => {
                    log::warn!(
                        "category {category}: star count {raw_stars:?} for {repository} is not a number ({error}), skipping pair"
                    );
                    batch.stats.malformed += 1;
                    continue;
                }
            };

            if let Some(&last) = cached.get(&repository) {
                if stars < last {
                    log::info!(
                        "category {category}: {repository} fell from {last} to {stars} within the bucket, discarding as scrape noise"
                    );
                    batch.stats.skipped += 1;
                    continue;
                }
            } else {
                log::debug!("category {category}: first observation of {repository} this bucket");
            }

            let (action, repo_id) = match self.existing.get(&bucket_key(category, &repository)) {
                Some(row) => (ChangeAction::Update, Some(row.id)),
                None => (ChangeAction::Create, None),
            };
            match action {
                ChangeAction::Create => batch.stats.created += 1,
                ChangeAction::Update => batch.stats.updated += 1,
            }

            batch.accepted.insert(repository.clone(), stars);
            batch.records.push(TrendingRecord {
                id: repo_id,
                date: self.bucket_date,
                repository: repository.clone(),
                stars,
                since: self.window,
                language: category.to_string(),
                updated_at: None,
                deleted_at: None,
            });
            batch.events.push(ChangeEvent {
                date: self.bucket_date.to_string(),
                repository,
                stars,
                since: self.window,
                language: category.to_string(),
                action,
                repo_id,
                time: None,
                timestamp: None,
            });
        }

        batch
    }
}

/// Key into the durable-row snapshot.
pub fn bucket_key(category: &str, repository: &str) -> String {
    format!("{category}:{repository}")
}

/// Collapse duplicate identifiers deterministically: the last value wins
/// and the first-seen position is kept.
fn dedup_last_wins(pairs: &[RankedPair]) -> Vec<(String, String)> {
    let mut order: Vec<String> = Vec::with_capacity(pairs.len());
    let mut latest: HashMap<String, String> = HashMap::with_capacity(pairs.len());

    for pair in pairs {
        if latest
            .insert(pair.repository.clone(), pair.stars.clone())
            .is_none()
        {
            order.push(pair.repository.clone());
        }
    }

    order
        .into_iter()
        .map(|repository| {
            let stars = latest.remove(&repository).unwrap_or_default();
            (repository, stars)
        })
        .collect()
}
