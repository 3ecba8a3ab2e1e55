//! Change event emission.

use chrono::{DateTime, Local, Utc};

use crate::error::Result;
use crate::models::ChangeEvent;
use crate::services::EventSink;

/// Delivers accepted change batches to the configured sink.
///
/// Emission is observability, not a transactional participant: the caller
/// logs a returned error and moves on, and already-applied store and cache
/// mutations stay applied.
pub struct ChangeEmitter<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> ChangeEmitter<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    /// Stamp one authoritative emission time across a batch.
    ///
    /// Fields already set are left alone; unset ones all receive the same
    /// instant, so records inside a batch never skew against each other.
    pub fn stamp(events: &mut [ChangeEvent], now: DateTime<Utc>) {
        let human = now.with_timezone(&Local).to_rfc3339();
        let micros = now.timestamp_micros();
        for event in events {
            if event.time.is_none() {
                event.time = Some(human.clone());
            }
            if event.timestamp.is_none() {
                event.timestamp = Some(micros);
            }
        }
    }

    /// Stamp and deliver one category batch as a single outbound call.
    pub async fn emit(&self, events: &mut [ChangeEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        Self::stamp(events, Utc::now());
        self.sink.deliver(events).await?;
        Ok(events.len())
    }
}
