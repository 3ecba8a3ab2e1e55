// src/models/mod.rs

//! Domain models for the trending harvester.

mod config;
mod repository;
mod trending;
mod window;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, DatabaseConfig, GithubConfig, OpenObserveConfig, RedisConfig,
};
pub use repository::Repository;
pub use trending::{ChangeAction, ChangeEvent, RankedPair, StoredTrending, TrendingRecord};
pub use window::Window;
