//! Per-article processing and one full ingestion cycle.
//!
//! An article moves through dedup, classification, location extraction,
//! resolution, insert and publish. Failures are contained per article: the
//! cycle logs them, counts them in [`CycleStats`], and moves on. A store error
//! costs only its own article; a failed feed fetch, or a store that keeps
//! failing, aborts the cycle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use threatmap_common::{Coordinates, SourceType, ThreatMapError, ThreatRecord, GLOBAL_REGION};
use threatmap_store::ThreatStore;

use crate::broadcast::EventBroadcaster;
use crate::classifier::Classifier;
use crate::dedup::Deduplicator;
use crate::feeds::FeedSource;
use crate::resolver::LocationResolver;
use crate::scheduler::ScheduledJob;

/// Where a candidate came from. Local candidates carry their source city.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Global,
    Local { city: String },
}

impl Origin {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Global => SourceType::Global,
            Self::Local { .. } => SourceType::Local,
        }
    }
}

/// A validated article: title and content are present and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored(ThreatRecord),
    Duplicate,
    ClassificationFailed,
    NoCoordinates,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub classification_failed: u64,
    pub dropped_no_coordinates: u64,
    pub cities_failed: u64,
    pub store_failed: u64,
}

impl CycleStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Stored(_) => self.stored += 1,
            Outcome::Duplicate => self.duplicates += 1,
            Outcome::ClassificationFailed => self.classification_failed += 1,
            Outcome::NoCoordinates => self.dropped_no_coordinates += 1,
        }
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} stored={} duplicates={} malformed={} classification_failed={} dropped_no_coordinates={} cities_failed={} store_failed={}",
            self.fetched,
            self.stored,
            self.duplicates,
            self.malformed,
            self.classification_failed,
            self.dropped_no_coordinates,
            self.cities_failed,
            self.store_failed,
        )
    }
}

/// Long-lived collaborators shared by every feed's cycle.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub store: Arc<dyn ThreatStore>,
    pub classifier: Arc<Classifier>,
    pub resolver: Arc<LocationResolver>,
    #[builder(default = Arc::new(EventBroadcaster::new()))]
    pub broadcaster: Arc<EventBroadcaster>,
}

#[derive(Clone)]
pub struct ArticleProcessor {
    deps: PipelineDeps,
    dedup: Deduplicator,
}

impl ArticleProcessor {
    pub fn new(deps: PipelineDeps) -> Self {
        let dedup = Deduplicator::new(deps.store.clone());
        Self { deps, dedup }
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.deps.broadcaster
    }

    /// Run one candidate through the pipeline. `Err` only for store failures.
    pub async fn process(&self, candidate: Candidate) -> Result<Outcome, ThreatMapError> {
        let title = candidate.title.as_str();

        match self.dedup.admit(title).await {
            Ok(()) => {}
            Err(e) if e.is_duplicate() => {
                debug!(title, "Duplicate, skipping");
                return Ok(Outcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        let classification = match self.deps.classifier.classify(title, &candidate.content).await {
            Ok(c) => c,
            Err(e) => {
                warn!(title, error = %e, "Classification failed, skipping");
                return Ok(Outcome::ClassificationFailed);
            }
        };

        let locations = self.deps.classifier.extract_locations(&candidate.content).await;
        let (region, coordinates) = match self.place(&candidate.origin, &locations).await {
            Ok(placed) => placed,
            Err(e) => {
                warn!(title, error = %e, "Dropping local article");
                return Ok(Outcome::NoCoordinates);
            }
        };

        let record = ThreatRecord {
            id: Uuid::new_v4(),
            title: candidate.title.clone(),
            content: candidate.content,
            threat_level: classification.level,
            confidence: classification.confidence,
            source_type: candidate.origin.source_type(),
            region,
            coordinates,
            source_url: candidate.source_url,
            verified: false,
            created_at: Utc::now(),
        };

        match self.deps.store.insert(&record).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate() => {
                debug!(title = record.title.as_str(), "Lost insert race, skipping");
                return Ok(Outcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        info!(
            title = record.title.as_str(),
            level = %record.threat_level,
            source = %record.source_type,
            region = record.region.as_str(),
            "Stored threat"
        );
        self.deps.broadcaster.publish(&record);

        Ok(Outcome::Stored(record))
    }

    /// Region label and coordinates for a classified article.
    ///
    /// Global: first extracted location that resolves, else "Global" without
    /// coordinates. Local: the source city's coordinates, overridden by the
    /// first extracted location that resolves; no coordinates at all is an error.
    async fn place(
        &self,
        origin: &Origin,
        locations: &[String],
    ) -> Result<(String, Option<Coordinates>), ThreatMapError> {
        let first_resolved = self.first_resolved(locations).await;

        match origin {
            Origin::Global => Ok(match first_resolved {
                Some((name, coords)) => (name, Some(coords)),
                None => (GLOBAL_REGION.to_string(), None),
            }),
            Origin::Local { city } => {
                if let Some((name, coords)) = first_resolved {
                    let region = if name.eq_ignore_ascii_case(city) {
                        city.clone()
                    } else {
                        format!("{city} > {name}")
                    };
                    return Ok((region, Some(coords)));
                }
                match self.deps.resolver.resolve(city).await {
                    Some(coords) => Ok((city.clone(), Some(coords))),
                    None => Err(ThreatMapError::NoCoordinatesResolved(city.clone())),
                }
            }
        }
    }

    async fn first_resolved(&self, locations: &[String]) -> Option<(String, Coordinates)> {
        for name in locations {
            if let Some(coords) = self.deps.resolver.resolve(name).await {
                return Some((name.clone(), coords));
            }
        }
        None
    }
}

/// Consecutive store failures after which the rest of a batch is abandoned.
const MAX_CONSECUTIVE_STORE_FAILURES: u32 = 3;

/// One feed plus the processor: fetch a batch, then process it sequentially.
pub struct IngestionCycle {
    feed: Arc<dyn FeedSource>,
    processor: ArticleProcessor,
}

impl IngestionCycle {
    pub fn new(feed: Arc<dyn FeedSource>, processor: ArticleProcessor) -> Self {
        Self { feed, processor }
    }

    pub async fn run(&self) -> Result<CycleStats, ThreatMapError> {
        let feed = self.feed.name();
        info!(feed, "Ingestion cycle starting");

        let batch = self.feed.fetch().await?;
        let mut stats = CycleStats {
            fetched: batch.fetched,
            malformed: batch.malformed,
            cities_failed: batch.cities_failed,
            ..CycleStats::default()
        };

        let mut consecutive_store_failures = 0;
        for candidate in batch.candidates {
            let title = candidate.title.clone();
            match self.processor.process(candidate).await {
                Ok(outcome) => {
                    consecutive_store_failures = 0;
                    stats.record(&outcome);
                }
                Err(e) => {
                    stats.store_failed += 1;
                    consecutive_store_failures += 1;
                    warn!(feed, title = title.as_str(), error = %e, "Store failed, skipping article");
                    if consecutive_store_failures >= MAX_CONSECUTIVE_STORE_FAILURES {
                        warn!(feed, %stats, "Store keeps failing, abandoning cycle");
                        return Err(e);
                    }
                }
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl ScheduledJob for IngestionCycle {
    fn name(&self) -> &str {
        self.feed.name()
    }

    async fn run(&self) -> Result<CycleStats, ThreatMapError> {
        IngestionCycle::run(self).await
    }
}
