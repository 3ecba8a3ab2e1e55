// src/services/github.rs

//! Repository metadata fetch service.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::{GithubConfig, Repository};

/// Contract for hydrating repository metadata from the catalog API.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, full_name: &str) -> Result<Repository>;
}

/// GitHub REST API metadata fetcher.
pub struct GithubFetcher {
    client: Client,
    api_url: String,
    headers: HeaderMap,
}

impl GithubFetcher {
    pub fn new(client: Client, config: &GithubConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            headers: auth_headers(config)?,
        })
    }
}

/// Build the request headers the catalog API expects: content negotiation,
/// API version pin, and the configured bearer token.
fn auth_headers(config: &GithubConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_str(&config.version)
            .map_err(|e| AppError::config(format!("github.version: {e}")))?,
    );
    if !config.auth_key.is_empty() {
        let mut token = HeaderValue::from_str(&format!("Bearer {}", config.auth_key))
            .map_err(|e| AppError::config(format!("github.auth_key: {e}")))?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
    }
    Ok(headers)
}

#[async_trait]
impl MetadataFetcher for GithubFetcher {
    async fn fetch(&self, full_name: &str) -> Result<Repository> {
        let url = format!("{}/repos/{}", self.api_url, full_name.trim_matches('/'));
        log::debug!("fetching repository metadata from {url}");

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::extract(
                full_name,
                format!("metadata request to {url} returned {status}"),
            ));
        }

        Ok(response.json::<Repository>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_version_and_token() {
        let config = GithubConfig {
            auth_key: "token123".to_string(),
            ..GithubConfig::default()
        };
        let headers = auth_headers(&config).unwrap();
        assert_eq!(
            headers.get(ACCEPT).unwrap(),
            "application/vnd.github+json"
        );
        assert_eq!(headers.get("X-GitHub-Api-Version").unwrap(), "2022-11-28");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer token123");
    }

    #[test]
    fn no_authorization_without_key() {
        let headers = auth_headers(&GithubConfig::default()).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
