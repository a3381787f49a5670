use std::time::Duration;

use tracing::debug;

use super::types::*;
use crate::error::{ensure_success, Result};

const COHERE_API_URL: &str = "https://api.cohere.ai/v1";

pub(crate) struct CohereClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl CohereClient {
    pub fn new(api_key: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            api_key: api_key.to_string(),
            http: builder.build()?,
            base_url: COHERE_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/generate", self.base_url);

        debug!(model = %request.model, "Cohere generate request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}
