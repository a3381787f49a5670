//! Integration tests for PgThreatStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::Utc;
use sqlx::PgPool;
use threatmap_common::{Coordinates, SourceType, ThreatLevel, ThreatRecord, GLOBAL_REGION};
use threatmap_store::{PgThreatStore, ThreatStore};
use uuid::Uuid;

/// Get a migrated store on a clean table, or skip if no test DB is available.
async fn test_store() -> Option<PgThreatStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgThreatStore::new(pool);
    store.migrate().await.ok()?;

    sqlx::query("TRUNCATE threats").execute(store.pool()).await.ok()?;

    Some(store)
}

fn record(title: &str, source_type: SourceType, coordinates: Option<Coordinates>) -> ThreatRecord {
    ThreatRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: "Body text".to_string(),
        threat_level: ThreatLevel::High,
        confidence: 0.9,
        source_type,
        region: GLOBAL_REGION.to_string(),
        coordinates,
        source_url: Some("https://example.com/story".to_string()),
        verified: false,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn insert_then_find_by_title() {
    let Some(store) = test_store().await else {
        return;
    };

    let rec = record(
        "Earthquake strikes Turkey",
        SourceType::Global,
        Some(Coordinates::new(38.9637, 35.2433)),
    );
    let id = store.insert(&rec).await.unwrap();
    assert_eq!(id, rec.id);

    let found = store
        .find_by_title("Earthquake strikes Turkey")
        .await
        .unwrap()
        .expect("record should exist");
    assert_eq!(found.id, rec.id);
    assert_eq!(found.threat_level, ThreatLevel::High);
    assert_eq!(found.source_type, SourceType::Global);
    assert_eq!(found.coordinates, Some(Coordinates::new(38.9637, 35.2433)));
    assert!(!found.verified);
}

#[tokio::test]
async fn missing_title_returns_none() {
    let Some(store) = test_store().await else {
        return;
    };

    assert!(store.find_by_title("Nothing here").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_title_is_rejected() {
    let Some(store) = test_store().await else {
        return;
    };

    let first = record("Flood warnings in Bangladesh", SourceType::Global, None);
    let second = record("Flood warnings in Bangladesh", SourceType::Global, None);

    store.insert(&first).await.unwrap();
    let err = store.insert(&second).await.unwrap_err();
    assert!(err.is_duplicate());

    let found = store
        .find_by_title("Flood warnings in Bangladesh")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn concurrent_inserts_yield_one_row() {
    let Some(store) = test_store().await else {
        return;
    };

    let a = record("Storm hits coast", SourceType::Global, None);
    let b = record("Storm hits coast", SourceType::Global, None);
    let (ra, rb) = tokio::join!(store.insert(&a), store.insert(&b));

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM threats WHERE title = $1")
        .bind("Storm hits coast")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn local_record_without_coordinates_is_rejected_by_schema() {
    let Some(store) = test_store().await else {
        return;
    };

    let rec = record("Fire in Chicago", SourceType::Local, None);
    let err = store.insert(&rec).await.unwrap_err();
    assert!(!err.is_duplicate());
}
