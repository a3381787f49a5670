use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy for the ingestion pipeline.
///
/// Most variants are contained at the article or city level and only ever
/// surface as log lines. `Store` and `Config` are the ambient failures.
#[derive(Error, Debug)]
pub enum ThreatMapError {
    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Upstream error from {provider}: {message}")]
    Upstream { provider: String, message: String },

    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Geocoding unavailable: {0}")]
    GeocodeUnavailable(String),

    #[error("Duplicate item: {0}")]
    DuplicateItem(String),

    #[error("No coordinates resolved for: {0}")]
    NoCoordinatesResolved(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ThreatMapError {
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            retry_after,
        }
    }

    /// Throttling is the only condition the retry policy acts on.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateItem(_))
    }
}
