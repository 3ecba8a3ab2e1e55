//! Redis-backed dedup cache.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use crate::error::Result;
use crate::models::RedisConfig;
use crate::storage::{CacheKey, DedupCache};

/// Redis cache backend over a managed multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect with bounded connection and response timeouts.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout);
        let conn = ConnectionManager::new_with_config(client, manager_config).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl DedupCache for RedisCache {
    async fn read_counts(&self, key: &CacheKey) -> Result<HashMap<String, i64>> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(key.to_string()).await?;

        let mut counts = HashMap::with_capacity(raw.len());
        for (repository, value) in raw {
            match value.parse::<i64>() {
                Ok(stars) => {
                    counts.insert(repository, stars);
                }
                Err(error) => {
                    // A corrupt field only costs one dedup check; the store
                    // stays authoritative.
                    log::warn!(
                        "cache field {key} {repository}={value:?} is not a number ({error}), dropping"
                    );
                }
            }
        }
        Ok(counts)
    }

    async fn write_counts(
        &self,
        key: &CacheKey,
        counts: &HashMap<String, i64>,
        ttl: Duration,
    ) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let items: Vec<(&str, i64)> = counts
            .iter()
            .map(|(repository, stars)| (repository.as_str(), *stars))
            .collect();

        let _: () = conn.hset_multiple(key.to_string(), &items).await?;

        if let Err(error) = conn
            .expire::<_, ()>(key.to_string(), ttl.as_secs() as i64)
            .await
        {
            log::warn!("failed to set expiry on cache key {key}: {error}");
        } else {
            log::debug!(
                "cached {} counts under {key} with ttl {}s",
                items.len(),
                ttl.as_secs()
            );
        }
        Ok(())
    }
}
