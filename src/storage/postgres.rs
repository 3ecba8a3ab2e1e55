//! Postgres-backed durable store.
//!
//! Runtime (non-macro) queries keep the crate buildable without a live
//! database. Upserts go through `INSERT ... ON CONFLICT` against the bucket
//! uniqueness index, so re-applying a batch is a no-op beyond refreshed
//! star counts and timestamps.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::Result;
use crate::models::{DatabaseConfig, Repository, StoredTrending, TrendingRecord, Window};
use crate::storage::{RepositoryStore, TrendingStore};

/// Schema bootstrap, applied by the `init_db` task. Create-if-missing only;
/// real migrations live outside this binary.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS trending (
        id BIGSERIAL PRIMARY KEY,
        date DATE NOT NULL,
        repository VARCHAR(256) NOT NULL,
        stars BIGINT NOT NULL,
        since VARCHAR(16) NOT NULL,
        language VARCHAR(32) NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        deleted_at TIMESTAMPTZ
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS trending_bucket_key
        ON trending (date, since, language, repository)
        WHERE deleted_at IS NULL",
    "CREATE TABLE IF NOT EXISTS repositories (
        id BIGINT PRIMARY KEY,
        node_id VARCHAR(64) NOT NULL DEFAULT '',
        name VARCHAR(64) NOT NULL DEFAULT '',
        full_name VARCHAR(256) NOT NULL UNIQUE,
        private BOOLEAN NOT NULL DEFAULT FALSE,
        html_url VARCHAR(512) NOT NULL DEFAULT '',
        description TEXT,
        fork BOOLEAN NOT NULL DEFAULT FALSE,
        homepage VARCHAR(256),
        size BIGINT NOT NULL DEFAULT 0,
        stargazers_count BIGINT NOT NULL DEFAULT 0,
        language VARCHAR(32),
        forks_count BIGINT NOT NULL DEFAULT 0,
        archived BOOLEAN NOT NULL DEFAULT FALSE,
        open_issues_count BIGINT NOT NULL DEFAULT 0,
        topics TEXT[] NOT NULL DEFAULT '{}',
        visibility VARCHAR(32),
        created_at TIMESTAMPTZ,
        updated_at TIMESTAMPTZ,
        pushed_at TIMESTAMPTZ,
        fetched_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// Postgres storage backend.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect a bounded pool against the configured database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url())
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if missing.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::info!("schema bootstrap complete");
        Ok(())
    }
}

#[async_trait]
impl TrendingStore for PostgresStore {
    async fn load_bucket(
        &self,
        bucket_date: NaiveDate,
        window: Window,
    ) -> Result<Vec<StoredTrending>> {
        let rows = sqlx::query_as::<_, StoredTrending>(
            "SELECT id, repository, language FROM trending
             WHERE date = $1 AND since = $2 AND deleted_at IS NULL",
        )
        .bind(bucket_date)
        .bind(window.as_str())
        .fetch_all(&self.pool)
        .await?;

        log::debug!(
            "loaded {} existing rows for bucket {bucket_date} ({window})",
            rows.len()
        );
        Ok(rows)
    }

    async fn upsert_batch(&self, records: &[TrendingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO trending (date, repository, stars, since, language, updated_at)
                 VALUES ($1, $2, $3, $4, $5, now())
                 ON CONFLICT (date, since, language, repository) WHERE deleted_at IS NULL
                 DO UPDATE SET stars = EXCLUDED.stars, updated_at = now()",
            )
            .bind(record.date)
            .bind(&record.repository)
            .bind(record.stars)
            .bind(record.since.as_str())
            .bind(&record.language)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        log::debug!("upserted {} trending rows", records.len());
        Ok(())
    }
}

#[async_trait]
impl RepositoryStore for PostgresStore {
    async fn upsert_repositories(&self, repositories: &[Repository]) -> Result<()> {
        if repositories.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for repository in repositories {
            sqlx::query(
                "INSERT INTO repositories (
                    id, node_id, name, full_name, private, html_url, description,
                    fork, homepage, size, stargazers_count, language, forks_count,
                    archived, open_issues_count, topics, visibility,
                    created_at, updated_at, pushed_at, fetched_at
                 )
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                         $14, $15, $16, $17, $18, $19, $20, now())
                 ON CONFLICT (full_name) DO UPDATE SET
                    node_id = EXCLUDED.node_id,
                    name = EXCLUDED.name,
                    private = EXCLUDED.private,
                    html_url = EXCLUDED.html_url,
                    description = EXCLUDED.description,
                    fork = EXCLUDED.fork,
                    homepage = EXCLUDED.homepage,
                    size = EXCLUDED.size,
                    stargazers_count = EXCLUDED.stargazers_count,
                    language = EXCLUDED.language,
                    forks_count = EXCLUDED.forks_count,
                    archived = EXCLUDED.archived,
                    open_issues_count = EXCLUDED.open_issues_count,
                    topics = EXCLUDED.topics,
                    visibility = EXCLUDED.visibility,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at,
                    pushed_at = EXCLUDED.pushed_at,
                    fetched_at = now()",
            )
            .bind(repository.id)
            .bind(&repository.node_id)
            .bind(&repository.name)
            .bind(&repository.full_name)
            .bind(repository.private)
            .bind(&repository.html_url)
            .bind(&repository.description)
            .bind(repository.fork)
            .bind(&repository.homepage)
            .bind(repository.size)
            .bind(repository.stargazers_count)
            .bind(&repository.language)
            .bind(repository.forks_count)
            .bind(repository.archived)
            .bind(repository.open_issues_count)
            .bind(&repository.topics)
            .bind(&repository.visibility)
            .bind(repository.created_at)
            .bind(repository.updated_at)
            .bind(repository.pushed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        log::debug!("upserted {} repositories", repositories.len());
        Ok(())
    }
}
