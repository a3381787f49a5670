use std::sync::Arc;

use threatmap_common::ThreatMapError;
use threatmap_store::ThreatStore;

/// Title pre-check against the store. Runs before classification so a known
/// headline costs one lookup and no completion or geocoding calls.
///
/// This is an optimization only: two cycles can both pass the check for the
/// same title, and the store's uniqueness constraint settles the race.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn ThreatStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ThreatStore>) -> Self {
        Self { store }
    }

    /// `Err(DuplicateItem)` when a record with this exact title exists.
    pub async fn admit(&self, title: &str) -> Result<(), ThreatMapError> {
        match self.store.find_by_title(title).await? {
            Some(_) => Err(ThreatMapError::DuplicateItem(title.to_string())),
            None => Ok(()),
        }
    }
}
