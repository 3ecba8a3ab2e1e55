// src/config.rs

//! Configuration loading.
//!
//! A TOML file is the primary source; when the file is absent the process
//! falls back to environment variables so container deployments need no
//! mounted config.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration for the process.
pub fn load(path: &Path) -> Result<Config> {
    if path.exists() {
        log::info!("loading configuration from {}", path.display());
        Config::load(path)
    } else {
        log::info!(
            "config file {} not found, reading environment",
            path.display()
        );
        Ok(Config::from_env())
    }
}
