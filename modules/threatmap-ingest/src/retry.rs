//! Exponential backoff on throttling responses.
//!
//! Only `ThreatMapError::RateLimited` is retried. Every other error surfaces on
//! the first attempt. Sleeping goes through [`Sleeper`] so tests can record the
//! delays instead of waiting them out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use threatmap_common::ThreatMapError;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer, backed by `tokio::time::sleep`.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Total time the client may spend sleeping within one call.
    /// `None` retries until the provider stops throttling.
    pub budget: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(30 * 60),
            budget: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    /// Delay before retry number `attempt` (zero-based): `initial * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Runs an outbound request under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RateLimitedClient {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedClient {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `request` until it succeeds, fails with a non-throttling error,
    /// or the next backoff would overrun the budget.
    pub async fn call<T, F, Fut>(&self, label: &str, mut request: F) -> Result<T, ThreatMapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ThreatMapError>>,
    {
        let mut attempt: u32 = 0;
        let mut slept = Duration::ZERO;

        loop {
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => err,
                Err(err) => return Err(err),
            };

            let mut delay = self.policy.delay_for(attempt);
            if let ThreatMapError::RateLimited {
                retry_after: Some(hint),
                ..
            } = &err
            {
                delay = delay.max((*hint).min(self.policy.max_delay));
            }

            if let Some(budget) = self.policy.budget {
                if slept + delay > budget {
                    warn!(
                        call = label,
                        attempts = attempt + 1,
                        slept_secs = slept.as_secs(),
                        "Backoff budget exhausted"
                    );
                    return Err(err);
                }
            }

            warn!(
                call = label,
                attempt = attempt + 1,
                delay_secs = delay.as_secs(),
                "Rate limited, backing off"
            );
            self.sleeper.sleep(delay).await;
            slept += delay;
            attempt = attempt.saturating_add(1);
        }
    }
}
