//! Threat classification and location extraction over a text-completion backend.
//!
//! Both operations parse the model's free text in two stages: the whole
//! (fence-stripped) response as JSON first, then the first JSON span buried in
//! surrounding prose. Location extraction has a third, best-effort stage that
//! pulls capitalized word runs out of the response.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use ai_client::{first_json_span, strip_code_blocks, truncate_to_char_boundary, CompletionRequest, TextCompletion};
use threatmap_common::{ThreatLevel, ThreatMapError};

use crate::providers::ai_error;
use crate::retry::RateLimitedClient;

/// Article text beyond this many bytes is cut before prompting.
const MAX_PROMPT_CONTENT: usize = 4_000;

static CAPITALIZED_RUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*").ok());

/// What the model is asked to return for a classification.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ThreatAssessment {
    /// "High Threat", "Medium Threat", or "No Threat"
    pub prediction: String,
    /// Confidence between 0 and 1
    #[schemars(with = "f64")]
    pub confidence: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub level: ThreatLevel,
    pub confidence: f64,
}

pub struct Classifier {
    backend: Arc<dyn TextCompletion>,
    client: RateLimitedClient,
    assessment_schema: String,
}

impl Classifier {
    pub fn new(backend: Arc<dyn TextCompletion>, client: RateLimitedClient) -> Self {
        let schema = schemars::schema_for!(ThreatAssessment);
        Self {
            backend,
            client,
            assessment_schema: serde_json::to_string(&schema).unwrap_or_default(),
        }
    }

    pub async fn classify(&self, title: &str, content: &str) -> Result<Classification, ThreatMapError> {
        let prompt = format!(
            "Title: {title}\nContent: {content}\n\n\
             Classify the above news article as one of the following threat levels: \
             \"High Threat\", \"Medium Threat\", or \"No Threat\". \
             Respond ONLY with a JSON object in this format:\n\
             {{\"prediction\": \"High Threat|Medium Threat|No Threat\", \"confidence\": 0-1}}\n\n\
             The object must match this JSON schema:\n{schema}\n\nClassification:",
            content = truncate_to_char_boundary(content, MAX_PROMPT_CONTENT),
            schema = self.assessment_schema,
        );
        let request = CompletionRequest::new(prompt).max_tokens(50).temperature(0.2);

        let text = self
            .complete("classify", request)
            .await
            .map_err(|e| ThreatMapError::ClassificationFailed(e.to_string()))?;

        parse_classification(&text)
    }

    /// Candidate place names in first-seen order. Never fails: any error
    /// yields an empty list.
    pub async fn extract_locations(&self, content: &str) -> Vec<String> {
        let prompt = format!(
            "Extract all location names (cities, countries, regions, landmarks) from the \
             following text. Return ONLY a JSON array of location names, no other text:\n\n\
             Text: {}\n\nLocations:",
            truncate_to_char_boundary(content, MAX_PROMPT_CONTENT),
        );
        let request = CompletionRequest::new(prompt).max_tokens(200).temperature(0.1);

        match self.complete("extract_locations", request).await {
            Ok(text) => {
                let locations = parse_locations(&text);
                debug!(count = locations.len(), "Extracted locations");
                locations
            }
            Err(e) => {
                warn!(error = %e, "Location extraction failed");
                Vec::new()
            }
        }
    }

    async fn complete(&self, label: &str, request: CompletionRequest) -> Result<String, ThreatMapError> {
        let provider = self.backend.provider();
        self.client
            .call(label, || {
                let request = request.clone();
                async move {
                    self.backend
                        .complete(request)
                        .await
                        .map_err(|e| ai_error(provider, e))
                }
            })
            .await
    }
}

/// Parse a classification response.
pub fn parse_classification(text: &str) -> Result<Classification, ThreatMapError> {
    let stripped = strip_code_blocks(text).trim();
    let assessment = match serde_json::from_str::<ThreatAssessment>(stripped) {
        Ok(assessment) => assessment,
        Err(_) => {
            let span = first_json_span(text, '{', '}').ok_or_else(|| {
                ThreatMapError::ClassificationFailed(format!(
                    "no JSON object in response: {}",
                    truncate_to_char_boundary(text, 120)
                ))
            })?;
            info!("Classification response needed fallback parse");
            serde_json::from_str::<ThreatAssessment>(span)
                .map_err(|e| ThreatMapError::ClassificationFailed(format!("bad JSON object: {e}")))?
        }
    };

    let level = ThreatLevel::from_label(&assessment.prediction).ok_or_else(|| {
        ThreatMapError::ClassificationFailed(format!("unknown label '{}'", assessment.prediction))
    })?;
    let confidence = confidence_value(&assessment.confidence)?;

    Ok(Classification { level, confidence })
}

fn confidence_value(raw: &serde_json::Value) -> Result<f64, ThreatMapError> {
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(v.clamp(0.0, 1.0)),
        _ => Err(ThreatMapError::ClassificationFailed(format!(
            "invalid confidence: {raw}"
        ))),
    }
}

/// Parse a location-extraction response.
pub fn parse_locations(text: &str) -> Vec<String> {
    let stripped = strip_code_blocks(text).trim();
    let parsed = serde_json::from_str::<Vec<String>>(stripped).ok().or_else(|| {
        first_json_span(text, '[', ']').and_then(|span| serde_json::from_str::<Vec<String>>(span).ok())
    });

    let names = match parsed {
        Some(names) => names,
        None => {
            debug!("Location response was not a JSON array, scanning for capitalized names");
            match CAPITALIZED_RUN.as_ref() {
                Some(re) => re.find_iter(text).map(|m| m.as_str().to_string()).collect(),
                None => Vec::new(),
            }
        }
    };

    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}
