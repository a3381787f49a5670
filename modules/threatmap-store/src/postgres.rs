use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use threatmap_common::{Coordinates, ThreatMapError, ThreatRecord};

use crate::ThreatStore;

/// Row shape of the `threats` table. Enums are stored as text.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ThreatRow {
    id: Uuid,
    title: String,
    content: String,
    threat_level: String,
    confidence: f64,
    source_type: String,
    region: String,
    lat: Option<f64>,
    lng: Option<f64>,
    source_url: Option<String>,
    verified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ThreatRow> for ThreatRecord {
    type Error = ThreatMapError;

    fn try_from(row: ThreatRow) -> Result<Self, Self::Error> {
        let coordinates = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };
        Ok(ThreatRecord {
            id: row.id,
            threat_level: row.threat_level.parse().map_err(ThreatMapError::Store)?,
            source_type: row.source_type.parse().map_err(ThreatMapError::Store)?,
            title: row.title,
            content: row.content,
            confidence: row.confidence,
            region: row.region,
            coordinates,
            source_url: row.source_url,
            verified: row.verified,
            created_at: row.created_at,
        })
    }
}

/// Postgres-backed [`ThreatStore`].
#[derive(Clone)]
pub struct PgThreatStore {
    pool: PgPool,
}

impl PgThreatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), ThreatMapError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ThreatMapError::Store(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(err: sqlx::Error) -> ThreatMapError {
    ThreatMapError::Store(err.to_string())
}

#[async_trait]
impl ThreatStore for PgThreatStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<ThreatRecord>, ThreatMapError> {
        let row = sqlx::query_as::<_, ThreatRow>(
            r#"
            SELECT id, title, content, threat_level, confidence, source_type, region,
                   lat, lng, source_url, verified, created_at
            FROM threats
            WHERE title = $1
            "#,
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(ThreatRecord::try_from).transpose()
    }

    async fn insert(&self, record: &ThreatRecord) -> Result<Uuid, ThreatMapError> {
        // ON CONFLICT turns the unique-title race into an empty RETURNING set
        // instead of an aborted statement.
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO threats (id, title, content, threat_level, confidence, source_type,
                                 region, lat, lng, source_url, verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (title) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(record.threat_level.as_str())
        .bind(record.confidence)
        .bind(record.source_type.as_str())
        .bind(&record.region)
        .bind(record.coordinates.map(|c| c.lat))
        .bind(record.coordinates.map(|c| c.lng))
        .bind(&record.source_url)
        .bind(record.verified)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match inserted {
            Some((id,)) => Ok(id),
            None => {
                debug!(title = record.title.as_str(), "Insert lost title race");
                Err(ThreatMapError::DuplicateItem(record.title.clone()))
            }
        }
    }
}
