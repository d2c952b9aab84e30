//! Syndrome hypotheses, constitution scores and recommendations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `(feature_name, feature_value, weight)` tuple justifying a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub feature_name: String,
    pub feature_value: String,
    pub weight: f64,
}

impl Evidence {
    pub fn new(feature_name: impl Into<String>, feature_value: impl Into<String>, weight: f64) -> Self {
        Self {
            feature_name: feature_name.into(),
            feature_value: feature_value.into(),
            weight,
        }
    }
}

/// A named syndrome hypothesis with supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyndromeCandidate {
    pub id: String,
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl SyndromeCandidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            confidence: crate::feature::sanitize_confidence(confidence),
            evidences: Vec::new(),
            description: String::new(),
            category: String::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidences.push(evidence);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Score of one constitution archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionScore {
    pub type_id: String,
    pub type_name: String,
    pub score: f64,
    pub description: String,
    pub is_primary: bool,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Diet,
    Exercise,
    Lifestyle,
    Medication,
    FollowUp,
    Consultation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub content: String,
    pub reason: String,
    pub priority: i32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Recommendation {
    pub fn new(
        recommendation_type: RecommendationType,
        content: impl Into<String>,
        reason: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            recommendation_type,
            content: content.into(),
            reason: reason.into(),
            priority,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&RecommendationType::FollowUp).unwrap(),
            "\"FOLLOW_UP\""
        );
        let rec = Recommendation::new(RecommendationType::Diet, "eat barley", "clears damp", 5)
            .with_metadata("source", "syndrome");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "DIET");
        assert_eq!(json["metadata"]["source"], "syndrome");
    }

    #[test]
    fn candidate_constructor_sanitizes_confidence() {
        assert_eq!(SyndromeCandidate::new("a", "A", 3.0).confidence, 1.0);
        assert_eq!(SyndromeCandidate::new("a", "A", f64::INFINITY).confidence, 0.0);
    }
}
