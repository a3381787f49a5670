use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use threatmap_common::{FeedTarget, ThreatMapError};

use super::{to_candidate, FeedBatch, FeedSource};
use crate::pipeline::Origin;
use crate::retry::{RateLimitedClient, Sleeper};
use crate::traits::{CityQuery, CitySearch};

pub const LOCAL_KEYWORDS: &str = "crime OR accident OR fire OR protest OR weather OR traffic";

const RESULTS_PER_CITY: u32 = 5;
const DEFAULT_CITY_DELAY: Duration = Duration::from_secs(1);

/// Per-city incident search over a fixed list of targets.
pub struct LocalFeed {
    search: Arc<dyn CitySearch>,
    client: RateLimitedClient,
    sleeper: Arc<dyn Sleeper>,
    targets: Vec<FeedTarget>,
    city_delay: Duration,
}

impl LocalFeed {
    pub fn new(
        search: Arc<dyn CitySearch>,
        client: RateLimitedClient,
        sleeper: Arc<dyn Sleeper>,
        targets: Vec<FeedTarget>,
    ) -> Self {
        Self {
            search,
            client,
            sleeper,
            targets,
            city_delay: DEFAULT_CITY_DELAY,
        }
    }

    pub fn with_city_delay(mut self, delay: Duration) -> Self {
        self.city_delay = delay;
        self
    }

    pub fn query_for(target: &FeedTarget) -> CityQuery {
        CityQuery {
            target: target.clone(),
            q: format!("{} AND ({LOCAL_KEYWORDS})", target.city_name),
            max: RESULTS_PER_CITY,
        }
    }
}

#[async_trait]
impl FeedSource for LocalFeed {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self) -> Result<FeedBatch, ThreatMapError> {
        let mut batch = FeedBatch::default();

        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 && !self.city_delay.is_zero() {
                self.sleeper.sleep(self.city_delay).await;
            }

            let query = Self::query_for(target);
            let articles = match self
                .client
                .call("local search", || self.search.search_city(&query))
                .await
            {
                Ok(articles) => articles,
                Err(e) => {
                    warn!(city = target.city_name.as_str(), error = %e, "City fetch failed, continuing");
                    batch.cities_failed += 1;
                    continue;
                }
            };

            batch.fetched += articles.len() as u64;
            let origin = Origin::Local {
                city: target.city_name.clone(),
            };
            for article in articles {
                match to_candidate(article, origin.clone(), true) {
                    Ok(candidate) => batch.candidates.push(candidate),
                    Err(_) => batch.malformed += 1,
                }
            }
        }

        info!(
            provider = self.search.provider(),
            cities = self.targets.len(),
            cities_failed = batch.cities_failed,
            fetched = batch.fetched,
            valid = batch.candidates.len(),
            "Local news fetched"
        );
        Ok(batch)
    }
}
