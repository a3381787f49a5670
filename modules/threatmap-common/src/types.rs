use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Region label used when a global article has no resolvable location.
pub const GLOBAL_REGION: &str = "Global";

/// Topic under which new records are pushed to live subscribers.
pub const NEW_THREAT_TOPIC: &str = "new-threat";

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
    None,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::None => "None",
        }
    }

    /// Parse a classifier label. Accepts the bare level ("High") as well as
    /// the prompt vocabulary ("High Threat", "No Threat"), case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        let normalized = normalized
            .strip_suffix("threat")
            .map(str::trim)
            .unwrap_or(&normalized);
        match normalized {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "no" | "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown threat level: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Global,
    Local,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Local => "Local",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

// --- Records ---

/// A classified, enriched article as persisted in the threat store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatRecord {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub threat_level: ThreatLevel,
    pub confidence: f64,
    pub source_type: SourceType,
    pub region: String,
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// One fan-out target of the local feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTarget {
    pub city_name: String,
    pub country_code: String,
}

impl FeedTarget {
    pub fn new(city_name: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            city_name: city_name.into(),
            country_code: country_code.into(),
        }
    }

    /// The ten cities monitored by the local feed out of the box.
    pub fn defaults() -> Vec<FeedTarget> {
        [
            ("New York", "US"),
            ("Los Angeles", "US"),
            ("Chicago", "US"),
            ("London", "GB"),
            ("Paris", "FR"),
            ("Berlin", "DE"),
            ("Tokyo", "JP"),
            ("Mumbai", "IN"),
            ("Sydney", "AU"),
            ("Toronto", "CA"),
        ]
        .into_iter()
        .map(|(city, cc)| FeedTarget::new(city, cc))
        .collect()
    }

    /// Parse `"New York:US,London:GB"`. Entries without a country code are rejected.
    pub fn parse_list(raw: &str) -> Result<Vec<FeedTarget>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.rsplit_once(':') {
                Some((city, cc)) if !city.trim().is_empty() && !cc.trim().is_empty() => {
                    Ok(FeedTarget::new(city.trim(), cc.trim().to_uppercase()))
                }
                _ => Err(format!("invalid feed target '{entry}', expected City:CC")),
            })
            .collect()
    }
}

/// An article as returned by an upstream news provider, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub source_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_level_accepts_prompt_vocabulary() {
        assert_eq!(ThreatLevel::from_label("High Threat"), Some(ThreatLevel::High));
        assert_eq!(ThreatLevel::from_label("medium threat"), Some(ThreatLevel::Medium));
        assert_eq!(ThreatLevel::from_label(" Low "), Some(ThreatLevel::Low));
        assert_eq!(ThreatLevel::from_label("No Threat"), Some(ThreatLevel::None));
        assert_eq!(ThreatLevel::from_label("none"), Some(ThreatLevel::None));
        assert_eq!(ThreatLevel::from_label("Severe"), None);
        assert_eq!(ThreatLevel::from_label("threat"), None);
    }

    #[test]
    fn record_serializes_with_dashboard_field_names() {
        let record = ThreatRecord {
            id: Uuid::nil(),
            title: "Flood warnings in Bangladesh".into(),
            content: "Heavy rain".into(),
            threat_level: ThreatLevel::Medium,
            confidence: 0.7,
            source_type: SourceType::Global,
            region: GLOBAL_REGION.into(),
            coordinates: None,
            source_url: Some("https://example.com/a".into()),
            verified: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["threatLevel"], "Medium");
        assert_eq!(json["sourceType"], "Global");
        assert_eq!(json["sourceURL"], "https://example.com/a");
        assert!(json["coordinates"].is_null());
    }

    #[test]
    fn default_targets_are_ten_cities() {
        let targets = FeedTarget::defaults();
        assert_eq!(targets.len(), 10);
        assert_eq!(targets[0], FeedTarget::new("New York", "US"));
    }

    #[test]
    fn parse_feed_target_list() {
        let targets = FeedTarget::parse_list("New York:us, London:GB").unwrap();
        assert_eq!(
            targets,
            vec![FeedTarget::new("New York", "US"), FeedTarget::new("London", "GB")]
        );
        assert!(FeedTarget::parse_list("Paris").is_err());
    }
}
