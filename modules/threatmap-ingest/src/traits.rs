// Trait seams for the ingestion pipeline's outbound dependencies.
//
// HeadlineSource and CitySearch sit in front of the news providers, Geocoder in
// front of the geocoding service. Text completion uses ai_client::TextCompletion
// and persistence uses threatmap_store::ThreatStore directly.
//
// Every method returns ThreatMapError so the retry policy can recognise
// throttling regardless of which vendor produced it.

use async_trait::async_trait;

use threatmap_common::{Coordinates, FeedTarget, NewsArticle, ThreatMapError};

/// Keyword-filtered top-headlines request.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlineQuery {
    pub q: String,
    pub language: String,
    pub page_size: u32,
}

/// Per-city search request.
#[derive(Debug, Clone, PartialEq)]
pub struct CityQuery {
    pub target: FeedTarget,
    pub q: String,
    pub max: u32,
}

#[async_trait]
pub trait HeadlineSource: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn top_headlines(&self, query: &HeadlineQuery) -> Result<Vec<NewsArticle>, ThreatMapError>;
}

#[async_trait]
pub trait CitySearch: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn search_city(&self, query: &CityQuery) -> Result<Vec<NewsArticle>, ThreatMapError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// First match for a free-text place name, or `None` when the service has no result.
    async fn geocode(&self, name: &str) -> Result<Option<Coordinates>, ThreatMapError>;
}
