use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A playable track returned by a catalog search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    /// The id of the track at its source
    pub video_id: String,
    pub title: String,
    /// Duration in seconds
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider failed: {0}")]
    Provider(String),
    #[error("failed to parse search results: {0}")]
    Parse(String),
    #[error("failed to run search: {0}")]
    Io(#[from] std::io::Error),
}

/// Represents a type that can resolve a free-text query into playable
/// tracks. A search fails as a unit, there are no partial results.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}
