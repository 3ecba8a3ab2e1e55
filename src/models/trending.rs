//! Trending observation data structures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Window;

/// A single (repository, star count) pair scraped from a ranked listing.
///
/// The count stays raw text here; parsing happens during reconciliation so
/// malformed scrape data can be skipped pair by pair instead of failing the
/// whole listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPair {
    pub repository: String,
    pub stars: String,
}

impl RankedPair {
    pub fn new(repository: impl Into<String>, stars: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            stars: stars.into(),
        }
    }
}

/// A durable trending row.
///
/// At most one non-deleted row exists per (date, since, language,
/// repository); the store enforces this with a partial unique index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingRecord {
    /// Store-assigned row id; `None` until first persisted
    pub id: Option<i64>,

    /// Bucket date the observation belongs to
    pub date: NaiveDate,

    /// Repository identifier, `owner/name`
    pub repository: String,

    /// Last accepted star count
    pub stars: i64,

    /// Observation window
    pub since: Window,

    /// Listing category (language filter)
    pub language: String,

    pub updated_at: Option<DateTime<Utc>>,

    /// Soft-delete marker; never set by the harvest pipeline
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Projection of an existing durable row, loaded once per run for
/// create/update classification.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrending {
    pub id: i64,
    pub repository: String,
    pub language: String,
}

/// How a change event relates to the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
}

/// Normalized wire record for one accepted change.
///
/// `_time` and `_timestamp` are left unset by the reconciler; the emitter
/// stamps one authoritative emission time per batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChangeEvent {
    pub date: String,
    pub repository: String,
    pub stars: i64,
    pub since: Window,
    pub language: String,
    pub action: ChangeAction,

    /// Durable row id; present only for updates
    #[serde(rename = "repoId", skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<i64>,

    /// Human-readable emission time
    #[serde(rename = "_time", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Emission time in epoch microseconds
    #[serde(rename = "_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
