use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use threatmap_common::ThreatMapError;

use super::{to_candidate, FeedBatch, FeedSource};
use crate::pipeline::Origin;
use crate::retry::RateLimitedClient;
use crate::traits::{HeadlineQuery, HeadlineSource};

pub const GLOBAL_KEYWORDS: &str = "war OR conflict OR attack OR cyberattack OR crisis OR disaster OR terrorism OR political OR economic OR military";

/// Crisis-filtered top headlines.
pub struct GlobalFeed {
    source: Arc<dyn HeadlineSource>,
    client: RateLimitedClient,
    query: HeadlineQuery,
}

impl GlobalFeed {
    pub fn new(source: Arc<dyn HeadlineSource>, client: RateLimitedClient) -> Self {
        Self {
            source,
            client,
            query: HeadlineQuery {
                q: GLOBAL_KEYWORDS.to_string(),
                language: "en".to_string(),
                page_size: 15,
            },
        }
    }

    pub fn query(&self) -> &HeadlineQuery {
        &self.query
    }
}

#[async_trait]
impl FeedSource for GlobalFeed {
    fn name(&self) -> &'static str {
        "global"
    }

    async fn fetch(&self) -> Result<FeedBatch, ThreatMapError> {
        let articles = self
            .client
            .call("global headlines", || self.source.top_headlines(&self.query))
            .await?;

        let mut batch = FeedBatch {
            fetched: articles.len() as u64,
            ..FeedBatch::default()
        };
        for article in articles {
            match to_candidate(article, Origin::Global, false) {
                Ok(candidate) => batch.candidates.push(candidate),
                Err(_) => batch.malformed += 1,
            }
        }

        info!(
            provider = self.source.provider(),
            fetched = batch.fetched,
            valid = batch.candidates.len(),
            "Global headlines fetched"
        );
        Ok(batch)
    }
}
