// src/services/events.rs

//! Change event sink service.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, OpenObserveConfig};

/// Outbound sink for normalized change events.
///
/// Delivery is best-effort observability: implementations report failures,
/// callers log them, and nothing rolls back.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one category's batch in a single call.
    async fn deliver(&self, events: &[ChangeEvent]) -> Result<()>;
}

/// OpenObserve JSON ingestion sink.
pub struct OpenObserveSink {
    client: Client,
    url: String,
    username: String,
    token: String,
}

impl OpenObserveSink {
    pub fn new(client: Client, config: &OpenObserveConfig) -> Self {
        Self {
            client,
            url: config.ingest_url(),
            username: config.username.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl EventSink for OpenObserveSink {
    async fn deliver(&self, events: &[ChangeEvent]) -> Result<()> {
        let body = serde_json::to_vec(events)?;

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::sink(format!(
                "ingestion endpoint returned {status}: {body}"
            )));
        }

        log::debug!("delivered {} change events to {}", events.len(), self.url);
        Ok(())
    }
}
