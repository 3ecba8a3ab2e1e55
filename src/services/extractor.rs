// src/services/extractor.rs

//! Ranked-list extraction service.
//!
//! Scrapes (repository, star count) pairs from the public trending page
//! using configured CSS selectors.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, RankedPair, Window};

const ROW_SELECTOR: &str = "article";
const LINK_SELECTOR: &str = "h2 a";
const STARS_SELECTOR: &str = "div > span:last-child";

/// Contract for ranked-list extraction.
///
/// Implementations must fail on transport errors and non-2xx responses
/// rather than silently returning an empty list; the pipeline tells an
/// empty listing apart from an unreachable one.
#[async_trait]
pub trait ListExtractor: Send + Sync {
    async fn fetch(&self, category: &str, window: Window) -> Result<Vec<RankedPair>>;
}

/// Extractor backed by the live trending page.
pub struct TrendingPageExtractor {
    client: Client,
    base_url: String,
    digits: Regex,
}

impl TrendingPageExtractor {
    pub fn new(client: Client, config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client,
            base_url: config.trending_url.trim_end_matches('/').to_string(),
            digits: Regex::new(r"\d+")
                .map_err(|e| AppError::config(format!("digit pattern: {e}")))?,
        })
    }

    /// Build the listing URL for a category: "all" maps to the bare listing,
    /// anything else becomes a path segment.
    fn category_url(&self, category: &str) -> Result<String> {
        if category.trim().is_empty() {
            return Err(AppError::config("category must not be empty"));
        }
        if category.eq_ignore_ascii_case("all") {
            Ok(self.base_url.clone())
        } else {
            Ok(format!("{}/{}", self.base_url, category))
        }
    }

    /// Parse ranked pairs out of a listing document.
    ///
    /// Star labels keep their raw text when no digits are found, so
    /// unparseable counts surface downstream as skippable pairs instead of
    /// disappearing here.
    fn parse_list(&self, html: &str) -> Result<Vec<RankedPair>> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector(ROW_SELECTOR)?;
        let link_sel = parse_selector(LINK_SELECTOR)?;
        let stars_sel = parse_selector(STARS_SELECTOR)?;

        let mut pairs = Vec::new();
        for row in document.select(&row_sel) {
            let Some(link) = row.select(&link_sel).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let repository = href.trim().trim_matches('/').to_string();
            if repository.is_empty() {
                continue;
            }

            let stars_text: String = row
                .select(&stars_sel)
                .next()
                .map(|element| element.text().collect())
                .unwrap_or_default();
            let cleaned = stars_text.trim().replace(',', "");
            let stars = match self.digits.find(&cleaned) {
                Some(found) => found.as_str().to_string(),
                None => cleaned,
            };

            pairs.push(RankedPair::new(repository, stars));
        }
        Ok(pairs)
    }
}

#[async_trait]
impl ListExtractor for TrendingPageExtractor {
    async fn fetch(&self, category: &str, window: Window) -> Result<Vec<RankedPair>> {
        let url = self.category_url(category)?;
        log::info!("fetching trending list {url} since={window}");

        let response = self
            .client
            .get(&url)
            .query(&[("since", window.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::extract(
                category,
                format!("listing request to {url} returned {status}"),
            ));
        }

        let html = response.text().await?;
        let pairs = self.parse_list(&html)?;
        log::debug!("extracted {} ranked pairs for category {category}", pairs.len());
        Ok(pairs)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
