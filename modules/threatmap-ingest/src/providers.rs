// Trait impls for the vendor clients, plus error mapping into ThreatMapError.
//
// Throttling becomes ThreatMapError::RateLimited so RateLimitedClient can act on
// it; everything else is Upstream (news, completion) or GeocodeUnavailable.

use async_trait::async_trait;

use ai_client::AiError;
use news_client::{
    EverythingQuery, GNewsArticle, GNewsClient, GNewsSearchQuery, HeadlinesQuery, NewsApiArticle,
    NewsApiClient, NewsError,
};
use opencage_client::{GeocodeError, OpenCageClient};
use threatmap_common::{Coordinates, NewsArticle, ThreatMapError};

use crate::traits::{CityQuery, CitySearch, Geocoder, HeadlineQuery, HeadlineSource};

pub const NEWSAPI: &str = "newsapi";
pub const GNEWS: &str = "gnews";
pub const OPENCAGE: &str = "opencage";

pub fn news_error(provider: &str, err: NewsError) -> ThreatMapError {
    match err {
        NewsError::RateLimited { retry_after } => ThreatMapError::rate_limited(provider, retry_after),
        other => ThreatMapError::upstream(provider, other.to_string()),
    }
}

pub fn ai_error(provider: &str, err: AiError) -> ThreatMapError {
    match err {
        AiError::RateLimited { retry_after } => ThreatMapError::rate_limited(provider, retry_after),
        other => ThreatMapError::upstream(provider, other.to_string()),
    }
}

pub fn geocode_error(err: GeocodeError) -> ThreatMapError {
    match err {
        GeocodeError::RateLimited { retry_after } => {
            ThreatMapError::rate_limited(OPENCAGE, retry_after)
        }
        other => ThreatMapError::GeocodeUnavailable(other.to_string()),
    }
}

fn from_newsapi(article: NewsApiArticle) -> NewsArticle {
    NewsArticle {
        title: article.title,
        content: article.content,
        description: article.description,
        url: article.url,
        source_name: article.source.and_then(|s| s.name),
    }
}

fn from_gnews(article: GNewsArticle) -> NewsArticle {
    NewsArticle {
        title: article.title,
        content: article.content,
        description: article.description,
        url: article.url,
        source_name: article.source.and_then(|s| s.name),
    }
}

#[async_trait]
impl HeadlineSource for NewsApiClient {
    fn provider(&self) -> &'static str {
        NEWSAPI
    }

    async fn top_headlines(&self, query: &HeadlineQuery) -> Result<Vec<NewsArticle>, ThreatMapError> {
        let request = HeadlinesQuery {
            q: query.q.clone(),
            language: query.language.clone(),
            page_size: query.page_size,
        };
        let articles = NewsApiClient::top_headlines(self, &request)
            .await
            .map_err(|e| news_error(NEWSAPI, e))?;
        Ok(articles.into_iter().map(from_newsapi).collect())
    }
}

/// NewsAPI `everything`, newest first. Used when GNews is not configured.
#[async_trait]
impl CitySearch for NewsApiClient {
    fn provider(&self) -> &'static str {
        NEWSAPI
    }

    async fn search_city(&self, query: &CityQuery) -> Result<Vec<NewsArticle>, ThreatMapError> {
        let request = EverythingQuery {
            q: query.q.clone(),
            language: "en".to_string(),
            page_size: query.max,
            sort_by: "publishedAt".to_string(),
        };
        let articles = self
            .everything(&request)
            .await
            .map_err(|e| news_error(NEWSAPI, e))?;
        Ok(articles.into_iter().map(from_newsapi).collect())
    }
}

#[async_trait]
impl CitySearch for GNewsClient {
    fn provider(&self) -> &'static str {
        GNEWS
    }

    async fn search_city(&self, query: &CityQuery) -> Result<Vec<NewsArticle>, ThreatMapError> {
        let request = GNewsSearchQuery {
            q: query.q.clone(),
            lang: "en".to_string(),
            country: query.target.country_code.clone(),
            max: query.max,
        };
        let articles = self
            .search(&request)
            .await
            .map_err(|e| news_error(GNEWS, e))?;
        Ok(articles.into_iter().map(from_gnews).collect())
    }
}

#[async_trait]
impl Geocoder for OpenCageClient {
    async fn geocode(&self, name: &str) -> Result<Option<Coordinates>, ThreatMapError> {
        let found = OpenCageClient::geocode(self, name)
            .await
            .map_err(geocode_error)?;
        Ok(found.map(|g| Coordinates::new(g.lat, g.lng)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn throttling_maps_to_rate_limited() {
        let err = news_error(
            GNEWS,
            NewsError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            },
        );
        assert!(err.is_rate_limited());

        let err = ai_error("cohere", AiError::RateLimited { retry_after: None });
        assert!(err.is_rate_limited());

        let err = geocode_error(GeocodeError::RateLimited { retry_after: None });
        assert!(err.is_rate_limited());
    }

    #[test]
    fn other_failures_map_to_upstream_or_unavailable() {
        let err = news_error(
            NEWSAPI,
            NewsError::Api {
                status: 401,
                message: "apiKeyInvalid".into(),
            },
        );
        assert!(matches!(err, ThreatMapError::Upstream { ref provider, .. } if provider == NEWSAPI));

        let err = geocode_error(GeocodeError::Network("timeout".into()));
        assert!(matches!(err, ThreatMapError::GeocodeUnavailable(_)));
    }
}
