pub mod error;
pub mod types;

use std::time::Duration;

pub use error::{GeocodeError, Result};
pub use types::{GeocodeResponse, GeocodeResult, Geometry};

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

const BASE_URL: &str = "https://api.opencagedata.com/geocode/v1";
const MAX_QUERY_LEN: usize = 200;

pub struct OpenCageClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenCageClient {
    pub fn new(api_key: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Forward-geocode a place name. Returns the first result's `(lat, lng)`,
    /// or `None` when OpenCage has no match.
    pub async fn geocode(&self, query: &str) -> Result<Option<Geometry>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::InvalidQuery("empty query".to_string()));
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(GeocodeError::InvalidQuery(format!(
                "query too long (max {MAX_QUERY_LEN} chars)"
            )));
        }

        let url = format!("{}/json", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("limit", "1"),
                ("no_annotations", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(GeocodeError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: GeocodeResponse = resp.json().await?;
        let first = body.results.into_iter().next().map(|r| r.geometry);
        tracing::debug!(query, found = first.is_some(), "OpenCage lookup");
        Ok(first)
    }
}
