use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ThreatMapError;
use crate::types::FeedTarget;

/// Which text-completion service backs the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionProvider {
    Anthropic,
    OpenAi,
    Cohere,
}

impl CompletionProvider {
    pub fn key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Cohere => "COHERE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-haiku-4-5-20251001",
            Self::OpenAi => "gpt-4o-mini",
            Self::Cohere => "command",
        }
    }
}

impl FromStr for CompletionProvider {
    type Err = ThreatMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "cohere" => Ok(Self::Cohere),
            other => Err(ThreatMapError::Config(format!(
                "COMPLETION_PROVIDER must be anthropic, openai or cohere (got '{other}')"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // News providers
    pub news_api_key: Option<String>,
    pub gnews_api_key: Option<String>,

    // Classification
    pub completion_provider: CompletionProvider,
    pub completion_api_key: String,
    pub completion_model: String,

    // Geocoding
    pub opencage_api_key: Option<String>,

    // Scheduling
    pub global_interval: Duration,
    pub global_start_delay: Duration,
    pub local_interval: Duration,
    pub local_start_delay: Duration,
    pub local_targets: Vec<FeedTarget>,

    // Outbound calls
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub http_timeout: Duration,

    // Live server
    pub web_host: String,
    pub web_port: u16,
    pub frontend_url: String,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ThreatMapError> {
        let _ = dotenvy::dotenv();

        let completion_provider: CompletionProvider = env::var("COMPLETION_PROVIDER")
            .unwrap_or_else(|_| "anthropic".to_string())
            .parse()?;

        let local_targets = match optional_env("LOCAL_FEED_CITIES") {
            Some(raw) => FeedTarget::parse_list(&raw).map_err(ThreatMapError::Config)?,
            None => FeedTarget::defaults(),
        };

        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            news_api_key: optional_env("NEWS_API_KEY"),
            gnews_api_key: optional_env("GNEWS_API_KEY"),
            completion_provider,
            completion_api_key: required_env(completion_provider.key_var())?,
            completion_model: optional_env("COMPLETION_MODEL")
                .unwrap_or_else(|| completion_provider.default_model().to_string()),
            opencage_api_key: optional_env("OPENCAGE_API_KEY"),
            global_interval: secs_env("GLOBAL_FEED_INTERVAL_SECS", 15 * 60)?,
            global_start_delay: secs_env("GLOBAL_FEED_START_DELAY_SECS", 0)?,
            local_interval: secs_env("LOCAL_FEED_INTERVAL_SECS", 9 * 60)?,
            local_start_delay: secs_env("LOCAL_FEED_START_DELAY_SECS", 60)?,
            local_targets,
            backoff_initial: secs_env("BACKOFF_INITIAL_SECS", 60)?,
            backoff_max: secs_env("BACKOFF_MAX_SECS", 30 * 60)?,
            http_timeout: secs_env("HTTP_TIMEOUT_SECS", 30)?,
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 5000)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    /// Log which credentials are configured, never their values.
    pub fn log_redacted(&self) {
        info!(
            news_api_key = self.news_api_key.is_some(),
            gnews_api_key = self.gnews_api_key.is_some(),
            opencage_api_key = self.opencage_api_key.is_some(),
            completion_provider = ?self.completion_provider,
            completion_model = self.completion_model.as_str(),
            global_interval_secs = self.global_interval.as_secs(),
            local_interval_secs = self.local_interval.as_secs(),
            local_start_delay_secs = self.local_start_delay.as_secs(),
            local_targets = self.local_targets.len(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> Result<String, ThreatMapError> {
    optional_env(key)
        .ok_or_else(|| ThreatMapError::Config(format!("{key} environment variable is required")))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, ThreatMapError> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ThreatMapError::Config(format!("{key} must be a number (got '{raw}')"))),
        None => Ok(default),
    }
}

fn secs_env(key: &str, default_secs: u64) -> Result<Duration, ThreatMapError> {
    parsed_env(key, default_secs).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_aliases() {
        assert_eq!(
            "Claude".parse::<CompletionProvider>().unwrap(),
            CompletionProvider::Anthropic
        );
        assert_eq!(
            "openai".parse::<CompletionProvider>().unwrap(),
            CompletionProvider::OpenAi
        );
        assert!("gemini".parse::<CompletionProvider>().is_err());
    }

    #[test]
    fn provider_key_vars() {
        assert_eq!(CompletionProvider::Cohere.key_var(), "COHERE_API_KEY");
        assert_eq!(CompletionProvider::OpenAi.key_var(), "OPENAI_API_KEY");
    }
}
