//! Persistence boundary for threat records.
//!
//! The store owns title uniqueness: concurrent ingestion cycles may race on the
//! same headline, and exactly one insert wins. Losers get
//! [`ThreatMapError::DuplicateItem`].

mod postgres;

pub use postgres::PgThreatStore;

use async_trait::async_trait;
use threatmap_common::{ThreatMapError, ThreatRecord};
use uuid::Uuid;

#[async_trait]
pub trait ThreatStore: Send + Sync {
    /// Exact-title lookup.
    async fn find_by_title(&self, title: &str) -> Result<Option<ThreatRecord>, ThreatMapError>;

    /// Persist a new record. Fails with `DuplicateItem` when the title exists.
    async fn insert(&self, record: &ThreatRecord) -> Result<Uuid, ThreatMapError>;
}
