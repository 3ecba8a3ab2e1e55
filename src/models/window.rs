//! Observation windows and bucket date derivation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Hour of day (UTC) through which a period's listing is not yet considered
/// final; observations up to and including this hour land in the previous
/// day's bucket.
const FINALIZE_HOUR: u32 = 11;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Reporting granularity of one harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Daily,
    Weekly,
    Monthly,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Derive the canonical bucket date for an instant.
    ///
    /// Pure function of (instant, window): the effective day rolls back one
    /// day through the finalize cutoff, then weekly buckets roll back to the
    /// start of week (Monday) and monthly buckets to the first of the month.
    pub fn bucket_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let mut day = now.date_naive();
        if now.hour() <= FINALIZE_HOUR {
            day = day - ChronoDuration::days(1);
        }

        match self {
            Self::Daily => day,
            Self::Weekly => {
                day - ChronoDuration::days(i64::from(day.weekday().num_days_from_monday()))
            }
            Self::Monthly => day - ChronoDuration::days(i64::from(day.day0())),
        }
    }

    /// Time-to-live for dedup cache entries scoped to this window.
    ///
    /// One day of slack past the period length so a bucket stays deduped
    /// across the finalize cutoff.
    pub fn cache_ttl(&self) -> Duration {
        let days = match self {
            Self::Daily => 2,
            Self::Weekly => 8,
            Self::Monthly => 32,
        };
        Duration::from_secs(days * SECS_PER_DAY)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(AppError::config(format!("unknown window kind: {other}"))),
        }
    }
}
