//! Deterministic rule-based syndrome matching.

use crate::rules::{
    FeatureRequirement, RuleLibrary, SyndromeRule, REQUIRED_DEFAULT_WEIGHT,
    SUPPORTING_DEFAULT_WEIGHT,
};
use serde::{Deserialize, Serialize};
use sizhen_common::{Evidence, Feature, SyndromeCandidate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// How much evidence a surviving rule needs relative to its required features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidencePolicy {
    /// `evidence >= required + 2`
    Strict,
    /// `evidence >= required`
    #[default]
    Moderate,
    /// `evidence >= required / 2`
    Lenient,
}

impl EvidencePolicy {
    pub fn admits(&self, evidence_count: usize, required: usize) -> bool {
        match self {
            EvidencePolicy::Strict => evidence_count >= required + 2,
            EvidencePolicy::Moderate => evidence_count >= required,
            EvidencePolicy::Lenient => evidence_count as f64 >= required as f64 / 2.0,
        }
    }
}

type FeatureIndex<'a> = BTreeMap<&'a str, Vec<&'a Feature>>;

pub struct RuleMatcher {
    library: Arc<RuleLibrary>,
    confidence_threshold: f64,
    policy: EvidencePolicy,
}

impl RuleMatcher {
    pub fn new(library: Arc<RuleLibrary>) -> Self {
        Self {
            library,
            confidence_threshold: 0.7,
            policy: EvidencePolicy::default(),
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_policy(mut self, policy: EvidencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn library(&self) -> &RuleLibrary {
        &self.library
    }

    /// Score every rule in the library against the fused features.
    ///
    /// Output is sorted by descending confidence.
    pub fn match_syndromes(&self, features: &[Feature]) -> Vec<SyndromeCandidate> {
        let mut index: FeatureIndex<'_> = BTreeMap::new();
        for feature in features {
            index.entry(feature.name.as_str()).or_default().push(feature);
        }

        let mut candidates: Vec<SyndromeCandidate> = self
            .library
            .syndromes
            .iter()
            .filter_map(|rule| self.score_rule(rule, &index))
            .collect();

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        debug!(
            rules = self.library.syndromes.len(),
            matched = candidates.len(),
            policy = ?self.policy,
            "Rule matching complete"
        );
        candidates
    }

    fn score_rule(&self, rule: &SyndromeRule, index: &FeatureIndex<'_>) -> Option<SyndromeCandidate> {
        let mut evidences = Vec::new();
        let mut total_weight = 0.0;
        let mut confidence_sum = 0.0;

        for req in &rule.required_features {
            // One unmet requirement eliminates the rule.
            let feature = find_match(req, index)?;
            let weight = req.weight_or(REQUIRED_DEFAULT_WEIGHT);
            total_weight += weight;
            confidence_sum += feature.confidence * weight;
            evidences.push(Evidence::new(&feature.name, &feature.value, weight));
        }

        for req in &rule.supporting_features {
            if let Some(feature) = find_match(req, index) {
                let weight = req.weight_or(SUPPORTING_DEFAULT_WEIGHT);
                total_weight += weight;
                confidence_sum += feature.confidence * weight;
                evidences.push(Evidence::new(&feature.name, &feature.value, weight));
            }
        }

        if !self.policy.admits(evidences.len(), rule.required_features.len()) {
            return None;
        }

        let confidence = if total_weight > 0.0 {
            confidence_sum / total_weight
        } else {
            0.0
        };
        if confidence < self.confidence_threshold {
            return None;
        }

        let mut candidate = SyndromeCandidate::new(&rule.id, &rule.name, confidence)
            .with_description(&rule.description)
            .with_category(&rule.category);
        candidate.evidences = evidences;
        Some(candidate)
    }
}

fn find_match<'a>(req: &FeatureRequirement, index: &FeatureIndex<'a>) -> Option<&'a Feature> {
    index
        .get(req.name.as_str())?
        .iter()
        .copied()
        .find(|f| req.accepts(&f.value))
}
