//! Upstream news feeds.
//!
//! A feed turns one provider call (or one call per city) into validated
//! [`Candidate`]s. Articles without a usable title or body never leave the feed.

mod global;
mod local;

pub use global::{GlobalFeed, GLOBAL_KEYWORDS};
pub use local::{LocalFeed, LOCAL_KEYWORDS};

use async_trait::async_trait;
use tracing::info;

use threatmap_common::{NewsArticle, ThreatMapError};

use crate::pipeline::{Candidate, Origin};

/// The result of one fetch.
#[derive(Debug, Default)]
pub struct FeedBatch {
    pub candidates: Vec<Candidate>,
    /// Articles returned by the provider, malformed ones included.
    pub fetched: u64,
    pub malformed: u64,
    pub cities_failed: u64,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` means the whole fetch failed and the cycle is aborted.
    async fn fetch(&self) -> Result<FeedBatch, ThreatMapError>;
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a raw article. `allow_description` lets the description stand in
/// for a missing body (local feeds).
pub(crate) fn to_candidate(
    article: NewsArticle,
    origin: Origin,
    allow_description: bool,
) -> Result<Candidate, ThreatMapError> {
    let title = non_empty(article.title);
    let content = match non_empty(article.content) {
        Some(content) => Some(content),
        None if allow_description => non_empty(article.description),
        None => None,
    };

    match (title, content) {
        (Some(title), Some(content)) => Ok(Candidate {
            title,
            content,
            source_url: non_empty(article.url),
            origin,
        }),
        (title, _) => {
            let label = title.unwrap_or_else(|| "<untitled>".to_string());
            info!(title = label.as_str(), "Skipping article missing title or content");
            Err(ThreatMapError::MalformedContent(label))
        }
    }
}
