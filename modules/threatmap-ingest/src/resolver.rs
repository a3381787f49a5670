//! Place name to coordinates.
//!
//! Live geocoding first, then a static table of major places. The table is
//! consulted on a zero-result lookup, on a geocoder error, and when no geocoder
//! is configured at all, so a missing credential degrades rather than fails.

use std::sync::Arc;

use tracing::{debug, warn};

use threatmap_common::Coordinates;

use crate::retry::RateLimitedClient;
use crate::traits::Geocoder;

/// Ordered fallback table. Keys are lowercase; cities precede the countries
/// that contain them so the more specific match wins.
const FALLBACK_PLACES: &[(&str, Coordinates)] = &[
    // Cities
    ("new york", Coordinates::new(40.7128, -74.0060)),
    ("los angeles", Coordinates::new(34.0522, -118.2437)),
    ("chicago", Coordinates::new(41.8781, -87.6298)),
    ("washington", Coordinates::new(38.9072, -77.0369)),
    ("toronto", Coordinates::new(43.6532, -79.3832)),
    ("london", Coordinates::new(51.5074, -0.1278)),
    ("paris", Coordinates::new(48.8566, 2.3522)),
    ("berlin", Coordinates::new(52.5200, 13.4050)),
    ("moscow", Coordinates::new(55.7558, 37.6173)),
    ("kyiv", Coordinates::new(50.4501, 30.5234)),
    ("jerusalem", Coordinates::new(31.7683, 35.2137)),
    ("gaza", Coordinates::new(31.5017, 34.4668)),
    ("mumbai", Coordinates::new(19.0760, 72.8777)),
    ("beijing", Coordinates::new(39.9042, 116.4074)),
    ("tokyo", Coordinates::new(35.6762, 139.6503)),
    ("sydney", Coordinates::new(-33.8688, 151.2093)),
    // Countries
    ("united states", Coordinates::new(37.0902, -95.7129)),
    ("united kingdom", Coordinates::new(55.3781, -3.4360)),
    ("ukraine", Coordinates::new(48.3794, 31.1656)),
    ("russia", Coordinates::new(61.5240, 105.3188)),
    ("israel", Coordinates::new(31.0461, 34.8516)),
    ("turkey", Coordinates::new(38.9637, 35.2433)),
    ("syria", Coordinates::new(34.8021, 38.9968)),
    ("iran", Coordinates::new(32.4279, 53.6880)),
    ("bangladesh", Coordinates::new(23.6850, 90.3563)),
    ("india", Coordinates::new(20.5937, 78.9629)),
    ("china", Coordinates::new(35.8617, 104.1954)),
    ("japan", Coordinates::new(36.2048, 138.2529)),
];

/// First table entry whose key occurs in the normalized name.
pub fn fallback_lookup(name: &str) -> Option<Coordinates> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    FALLBACK_PLACES
        .iter()
        .find(|(key, _)| normalized.contains(key))
        .map(|(_, coords)| *coords)
}

pub struct LocationResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
    client: RateLimitedClient,
}

impl LocationResolver {
    pub fn new(geocoder: Option<Arc<dyn Geocoder>>, client: RateLimitedClient) -> Self {
        Self { geocoder, client }
    }

    pub async fn resolve(&self, name: &str) -> Option<Coordinates> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(geocoder) = &self.geocoder {
            match self.client.call("geocode", || geocoder.geocode(name)).await {
                Ok(Some(coords)) => return Some(coords),
                Ok(None) => debug!(location = name, "Geocoder returned no results"),
                Err(e) => warn!(location = name, error = %e, "Geocoding failed, using fallback table"),
            }
        }

        let found = fallback_lookup(name);
        debug!(location = name, found = found.is_some(), "Fallback table lookup");
        found
    }
}
