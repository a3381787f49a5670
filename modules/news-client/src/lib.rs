pub mod error;
pub mod types;

use std::time::Duration;

pub use error::{NewsError, Result};
pub use types::{
    ArticleSource, EverythingQuery, GNewsArticle, GNewsResponse, GNewsSearchQuery,
    HeadlinesQuery, NewsApiArticle, NewsApiResponse,
};

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";
const GNEWS_BASE_URL: &str = "https://gnews.io/api/v4";

fn build_http(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Map non-success statuses to errors; 429 becomes `RateLimited`.
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(NewsError::RateLimited { retry_after });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(NewsError::Api {
        status: status.as_u16(),
        message: body,
    })
}

// ---------------------------------------------------------------------------
// NewsAPI
// ---------------------------------------------------------------------------

pub struct NewsApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: String, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: build_http(timeout)?,
            api_key,
            base_url: NEWSAPI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Keyword-filtered top headlines.
    pub async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<Vec<NewsApiArticle>> {
        let url = format!("{}/top-headlines", self.base_url);
        let page_size = query.page_size.to_string();
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query.q.as_str()),
                ("language", query.language.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        self.read_articles(resp).await
    }

    /// Full-archive search, used for per-city local news when GNews is not configured.
    pub async fn everything(&self, query: &EverythingQuery) -> Result<Vec<NewsApiArticle>> {
        let url = format!("{}/everything", self.base_url);
        let page_size = query.page_size.to_string();
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query.q.as_str()),
                ("language", query.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("sortBy", query.sort_by.as_str()),
            ])
            .send()
            .await?;

        self.read_articles(resp).await
    }

    async fn read_articles(&self, resp: Response) -> Result<Vec<NewsApiArticle>> {
        let resp = ensure_success(resp).await?;
        let body: NewsApiResponse = resp.json().await?;

        // NewsAPI reports some failures with a 200 and status "error".
        if body.status != "ok" {
            return Err(NewsError::Api {
                status: 200,
                message: body
                    .message
                    .or(body.code)
                    .unwrap_or_else(|| "unknown NewsAPI error".to_string()),
            });
        }

        tracing::debug!(
            total = body.total_results,
            returned = body.articles.len(),
            "NewsAPI response"
        );
        Ok(body.articles)
    }
}

// ---------------------------------------------------------------------------
// GNews
// ---------------------------------------------------------------------------

pub struct GNewsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GNewsClient {
    pub fn new(api_key: String, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: build_http(timeout)?,
            api_key,
            base_url: GNEWS_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Country-scoped keyword search.
    pub async fn search(&self, query: &GNewsSearchQuery) -> Result<Vec<GNewsArticle>> {
        let url = format!("{}/search", self.base_url);
        let max = query.max.to_string();
        let country = query.country.to_lowercase();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", query.q.as_str()),
                ("lang", query.lang.as_str()),
                ("country", country.as_str()),
                ("max", max.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let body: GNewsResponse = resp.json().await?;
        tracing::debug!(
            total = body.total_articles,
            returned = body.articles.len(),
            "GNews response"
        );
        Ok(body.articles)
    }
}
