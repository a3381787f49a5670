//! End-to-end cycle tests over mocks: feed -> dedup -> classify -> resolve -> store -> publish.

use std::sync::Arc;
use std::time::Duration;

use threatmap_common::{Coordinates, FeedTarget, SourceType, ThreatLevel, ThreatMapError, GLOBAL_REGION};
use threatmap_ingest::feeds::{GLOBAL_KEYWORDS, LOCAL_KEYWORDS};
use threatmap_ingest::testing::{
    article, test_client, test_processor, MockCompletion, MockGeocoder, MockNewsProvider,
    MockThreatStore, RecordingSleeper, BANGLADESH, TURKEY,
};
use threatmap_ingest::traits::Geocoder;
use threatmap_ingest::{ArticleProcessor, EventBroadcaster, GlobalFeed, IngestionCycle, LocalFeed};

const TURKEY_TITLE: &str = "Earthquake strikes Turkey";
const TURKEY_BODY: &str = "A magnitude 7.8 earthquake struck southern Turkey overnight.";

struct Harness {
    store: Arc<MockThreatStore>,
    completion: MockCompletion,
    broadcaster: Arc<EventBroadcaster>,
    processor: ArticleProcessor,
}

fn harness(completion: MockCompletion, geocoder: Option<Arc<dyn Geocoder>>) -> Harness {
    let store = Arc::new(MockThreatStore::new());
    let broadcaster = Arc::new(EventBroadcaster::new());
    let processor = test_processor(store.clone(), completion.clone(), geocoder, broadcaster.clone());
    Harness {
        store,
        completion,
        broadcaster,
        processor,
    }
}

fn global_cycle(news: Arc<MockNewsProvider>, processor: ArticleProcessor) -> IngestionCycle {
    let feed = GlobalFeed::new(news, test_client(Arc::new(RecordingSleeper::new())));
    IngestionCycle::new(Arc::new(feed), processor)
}

fn local_cycle(
    news: Arc<MockNewsProvider>,
    targets: Vec<FeedTarget>,
    sleeper: Arc<RecordingSleeper>,
    processor: ArticleProcessor,
) -> IngestionCycle {
    let feed = LocalFeed::new(news, test_client(sleeper.clone()), sleeper, targets);
    IngestionCycle::new(Arc::new(feed), processor)
}

// =========================================================================
// Global feed
// =========================================================================

#[tokio::test]
async fn turkey_earthquake_is_high_threat_at_fallback_coordinates() {
    let completion = MockCompletion::new()
        .classify(TURKEY_TITLE, "High Threat", 0.93)
        .locations(TURKEY_BODY, &["Turkey"]);
    // Live geocoder configured but returns nothing, so the table answers.
    let h = harness(completion, Some(Arc::new(MockGeocoder::new())));
    let mut live = h.broadcaster.register();

    let news = Arc::new(MockNewsProvider::new().on_headlines(vec![article(TURKEY_TITLE, TURKEY_BODY)]));
    let stats = global_cycle(news, h.processor.clone()).run().await.unwrap();

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.stored, 1);

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.threat_level, ThreatLevel::High);
    assert_eq!(rec.confidence, 0.93);
    assert_eq!(rec.source_type, SourceType::Global);
    assert_eq!(rec.region, "Turkey");
    assert_eq!(rec.coordinates, Some(TURKEY));
    assert!(!rec.verified);

    let event = live.receiver.recv().await.unwrap();
    assert_eq!(event.event, "new-threat");
    assert_eq!(event.data.id, rec.id);
}

#[tokio::test]
async fn global_query_uses_crisis_keywords() {
    let h = harness(MockCompletion::new(), None);
    let news = Arc::new(MockNewsProvider::new().on_headlines(vec![]));
    global_cycle(news.clone(), h.processor).run().await.unwrap();

    let queries = news.headline_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].q, GLOBAL_KEYWORDS);
    assert_eq!(queries[0].language, "en");
    assert_eq!(queries[0].page_size, 15);
}

#[tokio::test]
async fn unresolvable_global_article_is_stored_as_global() {
    let title = "Markets tumble on rate fears";
    let body = "Stocks fell sharply across several exchanges.";
    let completion = MockCompletion::new()
        .classify(title, "Medium Threat", 0.55)
        .locations(body, &["Atlantis"]);
    let h = harness(completion, Some(Arc::new(MockGeocoder::new())));

    let news = Arc::new(MockNewsProvider::new().on_headlines(vec![article(title, body)]));
    let stats = global_cycle(news, h.processor).run().await.unwrap();

    assert_eq!(stats.stored, 1);
    let rec = &h.store.records()[0];
    assert_eq!(rec.region, GLOBAL_REGION);
    assert_eq!(rec.coordinates, None);
}

#[tokio::test]
async fn same_cycle_twice_stores_once_and_skips_classification() {
    let completion = MockCompletion::new()
        .classify(TURKEY_TITLE, "High Threat", 0.9)
        .locations(TURKEY_BODY, &["Turkey"]);
    let h = harness(completion, None);
    let news = Arc::new(MockNewsProvider::new().on_headlines(vec![article(TURKEY_TITLE, TURKEY_BODY)]));
    let cycle = global_cycle(news, h.processor.clone());

    let first = cycle.run().await.unwrap();
    let calls_after_first = h.completion.requests().len();
    let second = cycle.run().await.unwrap();

    assert_eq!(first.stored, 1);
    assert_eq!(second.stored, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(h.store.count_titled(TURKEY_TITLE), 1);
    assert_eq!(h.completion.requests().len(), calls_after_first);
}

#[tokio::test]
async fn concurrent_cycles_store_bangladesh_once() {
    let title = "Flood warnings in Bangladesh";
    let body = "Monsoon rains have swollen rivers across Bangladesh.";
    let completion = MockCompletion::new()
        .classify(title, "Medium Threat", 0.7)
        .locations(body, &["Bangladesh"]);
    let h = harness(completion, None);

    let news_a = Arc::new(MockNewsProvider::new().on_headlines(vec![article(title, body)]));
    let news_b = Arc::new(MockNewsProvider::new().on_headlines(vec![article(title, body)]));
    let a = global_cycle(news_a, h.processor.clone());
    let b = global_cycle(news_b, h.processor.clone());

    let (ra, rb) = tokio::join!(a.run(), b.run());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.stored + rb.stored, 1);
    assert_eq!(ra.duplicates + rb.duplicates, 1);
    assert_eq!(h.store.count_titled(title), 1);
    assert_eq!(h.store.records()[0].coordinates, Some(BANGLADESH));
}

#[tokio::test]
async fn unclassifiable_and_malformed_articles_are_skipped() {
    let completion = MockCompletion::new()
        .respond_when("Title: Gibberish\n", "I'd rather not say.")
        .classify(TURKEY_TITLE, "High Threat", 0.9)
        .locations(TURKEY_BODY, &["Turkey"]);
    let h = harness(completion, None);

    let mut untitled = article("x", "Body without a title");
    untitled.title = None;
    let news = Arc::new(MockNewsProvider::new().on_headlines(vec![
        untitled,
        article("Gibberish", "Unclassifiable body"),
        article(TURKEY_TITLE, TURKEY_BODY),
    ]));
    let stats = global_cycle(news, h.processor).run().await.unwrap();

    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.classification_failed, 1);
    assert_eq!(stats.stored, 1);
    assert_eq!(h.store.records().len(), 1);
}

#[tokio::test]
async fn failed_headline_fetch_aborts_the_cycle() {
    let h = harness(MockCompletion::new(), None);
    let news = Arc::new(
        MockNewsProvider::new().on_headlines_error(ThreatMapError::upstream("mock", "503 Service Unavailable")),
    );
    let err = global_cycle(news, h.processor).run().await.unwrap_err();
    assert!(matches!(err, ThreatMapError::Upstream { .. }));
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn throttled_headline_fetch_backs_off_then_succeeds() {
    let completion = MockCompletion::new()
        .classify(TURKEY_TITLE, "High Threat", 0.9)
        .locations(TURKEY_BODY, &["Turkey"]);
    let h = harness(completion, None);
    let news = Arc::new(
        MockNewsProvider::new()
            .on_headlines_error(ThreatMapError::rate_limited("mock", None))
            .on_headlines_error(ThreatMapError::rate_limited("mock", None))
            .on_headlines(vec![article(TURKEY_TITLE, TURKEY_BODY)]),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let feed = GlobalFeed::new(news.clone(), test_client(sleeper.clone()));
    let stats = IngestionCycle::new(Arc::new(feed), h.processor).run().await.unwrap();

    assert_eq!(stats.stored, 1);
    assert_eq!(news.headline_queries().len(), 3);
    assert_eq!(sleeper.recorded_secs(), vec![60, 120]);
}

// =========================================================================
// Local feed
// =========================================================================

#[tokio::test]
async fn local_article_takes_city_coordinates_and_description() {
    let title = "Warehouse fire in Paris suburb";
    let description = "Firefighters battled a blaze overnight.";
    let completion = MockCompletion::new()
        .classify(title, "Medium Threat", 0.6)
        .locations(description, &["Rue Inconnue"]);
    let h = harness(completion, None);

    let mut item = article(title, "");
    item.content = None;
    item.description = Some(description.to_string());
    let news = Arc::new(MockNewsProvider::new().on_city("Paris", vec![item]));
    let sleeper = Arc::new(RecordingSleeper::new());
    let stats = local_cycle(news.clone(), vec![FeedTarget::new("Paris", "FR")], sleeper, h.processor)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.stored, 1);
    let rec = &h.store.records()[0];
    assert_eq!(rec.source_type, SourceType::Local);
    assert_eq!(rec.content, description);
    assert_eq!(rec.region, "Paris");
    assert_eq!(rec.coordinates, Some(Coordinates::new(48.8566, 2.3522)));

    let q = &news.city_queries()[0];
    assert_eq!(q.q, format!("Paris AND ({LOCAL_KEYWORDS})"));
    assert_eq!(q.max, 5);
    assert_eq!(q.target.country_code, "FR");
}

#[tokio::test]
async fn resolved_mention_overrides_city() {
    let title = "London protest spreads";
    let body = "Demonstrators gathered in solidarity with Tokyo marchers.";
    let completion = MockCompletion::new()
        .classify(title, "Medium Threat", 0.5)
        .locations(body, &["Tokyo"]);
    let h = harness(completion, None);

    let news = Arc::new(MockNewsProvider::new().on_city("London", vec![article(title, body)]));
    local_cycle(news, vec![FeedTarget::new("London", "GB")], Arc::new(RecordingSleeper::new()), h.processor)
        .run()
        .await
        .unwrap();

    let rec = &h.store.records()[0];
    assert_eq!(rec.region, "London > Tokyo");
    assert_eq!(rec.coordinates, Some(Coordinates::new(35.6762, 139.6503)));
}

#[tokio::test]
async fn local_article_without_coordinates_is_dropped() {
    let title = "Traffic jam in Springfield";
    let body = "Commuters faced long delays downtown.";
    let completion = MockCompletion::new()
        .classify(title, "No Threat", 0.8)
        .locations(body, &["Main Street"]);
    let h = harness(completion, Some(Arc::new(MockGeocoder::new())));

    let news = Arc::new(MockNewsProvider::new().on_city("Springfield", vec![article(title, body)]));
    let stats = local_cycle(
        news,
        vec![FeedTarget::new("Springfield", "US")],
        Arc::new(RecordingSleeper::new()),
        h.processor,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(stats.dropped_no_coordinates, 1);
    assert_eq!(stats.stored, 0);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn failing_city_does_not_stop_the_others() {
    let completion = MockCompletion::new()
        .classify("Paris story", "No Threat", 0.9)
        .locations("Paris body", &[])
        .classify("London story", "No Threat", 0.9)
        .locations("London body", &[]);
    let h = harness(completion, None);

    let news = Arc::new(
        MockNewsProvider::new()
            .on_city("Paris", vec![article("Paris story", "Paris body")])
            .on_city("London", vec![article("London story", "London body")]),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let targets = vec![
        FeedTarget::new("Paris", "FR"),
        FeedTarget::new("Unregistered", "XX"),
        FeedTarget::new("London", "GB"),
    ];
    let stats = local_cycle(news, targets, sleeper.clone(), h.processor).run().await.unwrap();

    assert_eq!(stats.cities_failed, 1);
    assert_eq!(stats.stored, 2);
    // One pause between each pair of cities.
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1); 2]);
}

#[tokio::test]
async fn store_failure_on_one_article_does_not_stop_the_batch() {
    let completion = MockCompletion::new()
        .classify("Paris story", "No Threat", 0.9)
        .locations("Paris body", &[])
        .classify("London story", "Low Threat", 0.6)
        .locations("London body", &[]);
    let store = Arc::new(MockThreatStore::new().fail_insert_for("Paris story"));
    let processor = test_processor(
        store.clone(),
        completion,
        None,
        Arc::new(EventBroadcaster::new()),
    );

    let news = Arc::new(
        MockNewsProvider::new()
            .on_city("Paris", vec![article("Paris story", "Paris body")])
            .on_city("London", vec![article("London story", "London body")]),
    );
    let targets = vec![FeedTarget::new("Paris", "FR"), FeedTarget::new("London", "GB")];
    let stats = local_cycle(news, targets, Arc::new(RecordingSleeper::new()), processor)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.store_failed, 1);
    assert_eq!(stats.stored, 1);
    assert_eq!(store.count_titled("London story"), 1);
    assert_eq!(store.count_titled("Paris story"), 0);
}

#[tokio::test]
async fn store_that_keeps_failing_abandons_the_cycle() {
    let titles = ["Story one", "Story two", "Story three", "Story four"];
    let mut completion = MockCompletion::new();
    let mut store = MockThreatStore::new();
    let mut articles = Vec::new();
    for title in titles {
        let body = format!("{title} body");
        completion = completion.classify(title, "Low Threat", 0.5).locations(&body, &[]);
        store = store.fail_insert_for(title);
        articles.push(article(title, &body));
    }
    let store = Arc::new(store);
    let processor = test_processor(store.clone(), completion, None, Arc::new(EventBroadcaster::new()));

    let news = Arc::new(MockNewsProvider::new().on_headlines(articles));
    let err = global_cycle(news, processor).run().await.unwrap_err();

    assert!(matches!(err, ThreatMapError::Store(_)));
    assert!(store.records().is_empty());
}
