// Test mocks for the ingestion pipeline.
//
// One mock per trait boundary:
// - MockNewsProvider (HeadlineSource + CitySearch): canned articles per query
// - MockCompletion (TextCompletion): substring-matched canned responses
// - MockGeocoder (Geocoder): name -> coordinates map
// - MockThreatStore (ThreatStore): in-memory, enforces title uniqueness
// - RecordingSleeper (Sleeper): records delays, never waits
//
// Plus helpers for building records and a ready-to-use pipeline.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ai_client::{AiError, CompletionRequest, TextCompletion};
use threatmap_common::{
    Coordinates, NewsArticle, SourceType, ThreatLevel, ThreatMapError, ThreatRecord, GLOBAL_REGION,
};
use threatmap_store::ThreatStore;

use crate::broadcast::EventBroadcaster;
use crate::classifier::Classifier;
use crate::pipeline::{ArticleProcessor, PipelineDeps};
use crate::resolver::LocationResolver;
use crate::retry::{RateLimitedClient, RetryPolicy, Sleeper};
use crate::traits::{CityQuery, CitySearch, Geocoder, HeadlineQuery, HeadlineSource};

/// Turkey, from the fallback table.
pub const TURKEY: Coordinates = Coordinates::new(38.9637, 35.2433);
/// Bangladesh, from the fallback table.
pub const BANGLADESH: Coordinates = Coordinates::new(23.6850, 90.3563);

// ---------------------------------------------------------------------------
// Records and articles
// ---------------------------------------------------------------------------

pub fn threat_record(title: &str, source_type: SourceType) -> ThreatRecord {
    ThreatRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("Body of {title}"),
        threat_level: ThreatLevel::Medium,
        confidence: 0.5,
        source_type,
        region: GLOBAL_REGION.to_string(),
        coordinates: None,
        source_url: None,
        verified: false,
        created_at: Utc::now(),
    }
}

pub fn article(title: &str, content: &str) -> NewsArticle {
    NewsArticle {
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        description: None,
        url: Some(format!("https://news.example.com/{}", title.len())),
        source_name: Some("Example Wire".to_string()),
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn recorded_secs(&self) -> Vec<u64> {
        self.recorded().iter().map(Duration::as_secs).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// MockNewsProvider
// ---------------------------------------------------------------------------

/// Canned news provider. Headlines are served from a queue (one batch per
/// call, the last batch repeating); city searches are keyed by city name and
/// return `Err` for unregistered cities.
#[derive(Default)]
pub struct MockNewsProvider {
    headlines: Mutex<VecDeque<Result<Vec<NewsArticle>, ThreatMapError>>>,
    last_headlines: Mutex<Vec<NewsArticle>>,
    cities: HashMap<String, Vec<NewsArticle>>,
    headline_queries: Mutex<Vec<HeadlineQuery>>,
    city_queries: Mutex<Vec<CityQuery>>,
}

impl MockNewsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_headlines(self, articles: Vec<NewsArticle>) -> Self {
        self.headlines.lock().unwrap().push_back(Ok(articles));
        self
    }

    pub fn on_headlines_error(self, err: ThreatMapError) -> Self {
        self.headlines.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn on_city(mut self, city: &str, articles: Vec<NewsArticle>) -> Self {
        self.cities.insert(city.to_string(), articles);
        self
    }

    pub fn headline_queries(&self) -> Vec<HeadlineQuery> {
        self.headline_queries.lock().unwrap().clone()
    }

    pub fn city_queries(&self) -> Vec<CityQuery> {
        self.city_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HeadlineSource for MockNewsProvider {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn top_headlines(&self, query: &HeadlineQuery) -> Result<Vec<NewsArticle>, ThreatMapError> {
        self.headline_queries.lock().unwrap().push(query.clone());
        let next = self.headlines.lock().unwrap().pop_front();
        match next {
            Some(Ok(articles)) => {
                *self.last_headlines.lock().unwrap() = articles.clone();
                Ok(articles)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_headlines.lock().unwrap().clone()),
        }
    }
}

#[async_trait]
impl CitySearch for MockNewsProvider {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn search_city(&self, query: &CityQuery) -> Result<Vec<NewsArticle>, ThreatMapError> {
        self.city_queries.lock().unwrap().push(query.clone());
        self.cities
            .get(&query.target.city_name)
            .cloned()
            .ok_or_else(|| {
                ThreatMapError::upstream("mock", format!("no city registered for {}", query.target.city_name))
            })
    }
}

// ---------------------------------------------------------------------------
// MockCompletion
// ---------------------------------------------------------------------------

/// Substring-matched completion backend. The first rule whose needle occurs
/// in the prompt wins; no match is an API error. Clones share state.
#[derive(Clone, Default)]
pub struct MockCompletion {
    rules: Arc<Mutex<Vec<(String, String)>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_when(self, needle: &str, response: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), response.to_string()));
        self
    }

    /// Classification response for prompts mentioning `title`.
    pub fn classify(self, title: &str, label: &str, confidence: f64) -> Self {
        let response = format!(r#"{{"prediction": "{label}", "confidence": {confidence}}}"#);
        self.respond_when(&format!("Title: {title}\n"), &response)
    }

    /// Location-extraction response for prompts containing `content`.
    pub fn locations(self, content: &str, names: &[&str]) -> Self {
        let response = serde_json::to_string(names).unwrap();
        self.respond_when(&format!("Text: {content}"), &response)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for MockCompletion {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> ai_client::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| AiError::Api {
                status: 500,
                message: "MockCompletion: no response registered".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MockGeocoder
// ---------------------------------------------------------------------------

/// Map-based geocoder. Unknown names resolve to `Ok(None)`.
#[derive(Default)]
pub struct MockGeocoder {
    places: HashMap<String, Coordinates>,
    failure: Option<fn() -> ThreatMapError>,
    lookups: Mutex<Vec<String>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, name: &str, coords: Coordinates) -> Self {
        self.places.insert(name.to_string(), coords);
        self
    }

    /// Every lookup fails with the given error.
    pub fn failing_with(mut self, make: fn() -> ThreatMapError) -> Self {
        self.failure = Some(make);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, name: &str) -> Result<Option<Coordinates>, ThreatMapError> {
        self.lookups.lock().unwrap().push(name.to_string());
        if let Some(make) = self.failure {
            return Err(make());
        }
        Ok(self.places.get(name).copied())
    }
}

// ---------------------------------------------------------------------------
// MockThreatStore
// ---------------------------------------------------------------------------

/// In-memory store. Insert checks and writes under one lock, so concurrent
/// inserts of the same title behave like the Postgres unique constraint.
#[derive(Default)]
pub struct MockThreatStore {
    records: Mutex<Vec<ThreatRecord>>,
    failing_titles: Mutex<Vec<String>>,
}

impl MockThreatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert` fail with a `Store` error for this title.
    pub fn fail_insert_for(self, title: &str) -> Self {
        self.failing_titles.lock().unwrap().push(title.to_string());
        self
    }

    pub fn records(&self) -> Vec<ThreatRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.title == title)
            .count()
    }
}

#[async_trait]
impl ThreatStore for MockThreatStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<ThreatRecord>, ThreatMapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.title == title)
            .cloned())
    }

    async fn insert(&self, record: &ThreatRecord) -> Result<Uuid, ThreatMapError> {
        if self.failing_titles.lock().unwrap().contains(&record.title) {
            return Err(ThreatMapError::Store("connection reset".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.title == record.title) {
            return Err(ThreatMapError::DuplicateItem(record.title.clone()));
        }
        records.push(record.clone());
        Ok(record.id)
    }
}

// ---------------------------------------------------------------------------
// Pipeline wiring
// ---------------------------------------------------------------------------

pub fn test_client(sleeper: Arc<dyn Sleeper>) -> RateLimitedClient {
    RateLimitedClient::new(RetryPolicy::default(), sleeper)
}

/// Processor over mocks. `geocoder: None` exercises the fallback table only.
pub fn test_processor(
    store: Arc<MockThreatStore>,
    completion: MockCompletion,
    geocoder: Option<Arc<dyn Geocoder>>,
    broadcaster: Arc<EventBroadcaster>,
) -> ArticleProcessor {
    let client = test_client(Arc::new(RecordingSleeper::new()));
    let deps = PipelineDeps::builder()
        .store(store)
        .classifier(Arc::new(Classifier::new(Arc::new(completion), client.clone())))
        .resolver(Arc::new(LocationResolver::new(geocoder, client)))
        .broadcaster(broadcaster)
        .build();
    ArticleProcessor::new(deps)
}
