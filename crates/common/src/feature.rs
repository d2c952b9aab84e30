//! Canonical feature records and per-modality diagnosis results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic category a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Tongue,
    Face,
    Voice,
    Pulse,
    Symptom,
    History,
}

impl FeatureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Tongue => "tongue",
            FeatureCategory::Face => "face",
            FeatureCategory::Voice => "voice",
            FeatureCategory::Pulse => "pulse",
            FeatureCategory::Symptom => "symptom",
            FeatureCategory::History => "history",
        }
    }

    /// Parse a category label reported by a remote service.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "tongue" => Some(FeatureCategory::Tongue),
            "face" => Some(FeatureCategory::Face),
            "voice" => Some(FeatureCategory::Voice),
            "pulse" => Some(FeatureCategory::Pulse),
            "symptom" => Some(FeatureCategory::Symptom),
            "history" => Some(FeatureCategory::History),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: String,
    pub confidence: f64,
    pub category: FeatureCategory,
}

impl Feature {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        category: FeatureCategory,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            confidence: sanitize_confidence(confidence),
            category,
        }
    }
}

/// The four diagnostic channels, in their fixed dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisType {
    Looking,
    Listening,
    Inquiry,
    Palpation,
}

impl DiagnosisType {
    pub const ALL: [DiagnosisType; 4] = [
        DiagnosisType::Looking,
        DiagnosisType::Listening,
        DiagnosisType::Inquiry,
        DiagnosisType::Palpation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisType::Looking => "LOOKING",
            DiagnosisType::Listening => "LISTENING",
            DiagnosisType::Inquiry => "INQUIRY",
            DiagnosisType::Palpation => "PALPATION",
        }
    }

    /// Identifier of the remote service backing this modality.
    pub fn service_id(&self) -> &'static str {
        match self {
            DiagnosisType::Looking => "look-service",
            DiagnosisType::Listening => "listen-service",
            DiagnosisType::Inquiry => "inquiry-service",
            DiagnosisType::Palpation => "palpation-service",
        }
    }

    /// Human-readable label used in prompts and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosisType::Looking => "looking",
            DiagnosisType::Listening => "listening",
            DiagnosisType::Inquiry => "inquiry",
            DiagnosisType::Palpation => "palpation",
        }
    }

    /// Category assigned to remote features whose own category is missing or unknown.
    pub fn default_category(&self) -> FeatureCategory {
        match self {
            DiagnosisType::Looking => FeatureCategory::Tongue,
            DiagnosisType::Listening => FeatureCategory::Voice,
            DiagnosisType::Inquiry => FeatureCategory::Symptom,
            DiagnosisType::Palpation => FeatureCategory::Pulse,
        }
    }
}

impl fmt::Display for DiagnosisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized output of one modality that returned successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub diagnosis_id: String,

    #[serde(rename = "type")]
    pub diagnosis_type: DiagnosisType,

    pub source_service: String,

    pub confidence: f64,

    pub features: Vec<Feature>,

    /// Raw detailed text returned by the remote service
    pub detailed_result: String,

    /// Unix seconds
    pub timestamp: u64,
}

/// Flatten the features of every successful result into one list, preserving order.
pub fn fuse_features(results: &[DiagnosisResult]) -> Vec<Feature> {
    results
        .iter()
        .flat_map(|result| result.features.iter().cloned())
        .collect()
}

/// Map any externally supplied confidence into `[0, 1]`.
pub fn sanitize_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_confidence_is_clamped() {
        assert_eq!(Feature::new("a", "b", 1.7, FeatureCategory::Pulse).confidence, 1.0);
        assert_eq!(Feature::new("a", "b", -0.2, FeatureCategory::Pulse).confidence, 0.0);
        assert_eq!(Feature::new("a", "b", f64::NAN, FeatureCategory::Pulse).confidence, 0.0);
        assert_eq!(Feature::new("a", "b", 0.42, FeatureCategory::Pulse).confidence, 0.42);
    }

    #[test]
    fn category_parse_accepts_case_and_whitespace() {
        assert_eq!(FeatureCategory::parse(" Tongue "), Some(FeatureCategory::Tongue));
        assert_eq!(FeatureCategory::parse("HISTORY"), Some(FeatureCategory::History));
        assert_eq!(FeatureCategory::parse("aura"), None);
    }

    #[test]
    fn diagnosis_type_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&DiagnosisType::Palpation).unwrap(),
            "\"PALPATION\""
        );
        assert_eq!(DiagnosisType::Looking.to_string(), "LOOKING");
    }

    #[test]
    fn fuse_preserves_modality_then_feature_order() {
        let make = |t: DiagnosisType, names: &[&str]| DiagnosisResult {
            diagnosis_id: "d".into(),
            diagnosis_type: t,
            source_service: t.service_id().into(),
            confidence: 0.9,
            features: names
                .iter()
                .map(|n| Feature::new(*n, "x", 0.5, t.default_category()))
                .collect(),
            detailed_result: String::new(),
            timestamp: 0,
        };

        let fused = fuse_features(&[
            make(DiagnosisType::Looking, &["tongue_color", "coating"]),
            make(DiagnosisType::Palpation, &["pulse_type"]),
        ]);
        let names: Vec<_> = fused.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["tongue_color", "coating", "pulse_type"]);
    }

    #[test]
    fn diagnosis_result_uses_type_key() {
        let result = DiagnosisResult {
            diagnosis_id: "d1".into(),
            diagnosis_type: DiagnosisType::Inquiry,
            source_service: "inquiry-service".into(),
            confidence: 0.7,
            features: vec![],
            detailed_result: String::new(),
            timestamp: 1,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "INQUIRY");
    }
}
