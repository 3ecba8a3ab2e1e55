//! Repository catalog metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository metadata fetched from the catalog API.
///
/// A trimmed projection of the upstream payload; fields the catalog omits
/// fall back to defaults and unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,

    #[serde(default)]
    pub node_id: String,

    #[serde(default)]
    pub name: String,

    /// Unique `owner/name` identifier; upsert key in the durable store
    pub full_name: String,

    #[serde(default)]
    pub private: bool,

    #[serde(default)]
    pub html_url: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub fork: bool,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub size: i64,

    #[serde(default)]
    pub stargazers_count: i64,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub forks_count: i64,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub open_issues_count: i64,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub visibility: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}
