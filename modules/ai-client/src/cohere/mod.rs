mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::traits::{CompletionRequest, TextCompletion};

use client::CohereClient;

/// Cohere `generate` completions. System text is prepended to the prompt
/// because the endpoint takes a single prompt string.
#[derive(Clone)]
pub struct Cohere {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl Cohere {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("COHERE_API_KEY")
            .map_err(|_| AiError::Config("COHERE_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> Result<CohereClient> {
        let client = CohereClient::new(&self.api_key, self.timeout)?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }
}

#[async_trait]
impl TextCompletion for Cohere {
    fn provider(&self) -> &'static str {
        "cohere"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let prompt = match request.system {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt,
        };

        let generate = types::GenerateRequest {
            model: self.model.clone(),
            prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self.client()?.generate(&generate).await?;

        response
            .generations
            .into_iter()
            .next()
            .map(|g| g.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(AiError::EmptyResponse("cohere"))
    }
}
