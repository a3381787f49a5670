use serde::Deserialize;

// --- NewsAPI ---

/// `GET /v2/top-headlines` and `GET /v2/everything` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub articles: Vec<NewsApiArticle>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    pub source: Option<ArticleSource>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Query for `top-headlines`.
#[derive(Debug, Clone)]
pub struct HeadlinesQuery {
    pub q: String,
    pub language: String,
    pub page_size: u32,
}

/// Query for `everything`.
#[derive(Debug, Clone)]
pub struct EverythingQuery {
    pub q: String,
    pub language: String,
    pub page_size: u32,
    pub sort_by: String,
}

// --- GNews ---

/// `GET /api/v4/search` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GNewsResponse {
    #[serde(default)]
    pub total_articles: u32,
    #[serde(default)]
    pub articles: Vec<GNewsArticle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GNewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub source: Option<ArticleSource>,
}

/// Query for GNews `search`.
#[derive(Debug, Clone)]
pub struct GNewsSearchQuery {
    pub q: String,
    pub lang: String,
    pub country: String,
    pub max: u32,
}
