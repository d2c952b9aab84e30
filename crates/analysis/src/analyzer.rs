//! Syndrome differentiation over the fused feature list.

use crate::hybrid::HybridAnalyzer;
use crate::matcher::RuleMatcher;
use crate::merge::{analysis_confidence, merge};
use sizhen_common::{Feature, SyndromeCandidate};
use tracing::info;

/// Merged candidates plus how many each source contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyndromeAnalysis {
    pub syndromes: Vec<SyndromeCandidate>,
    /// Mean confidence of `syndromes`
    pub confidence: f64,
    pub rule_candidates: usize,
    pub llm_candidates: usize,
}

/// Runs the rule matcher and, when wired, the model analyzer, then merges them.
pub struct SyndromeAnalyzer {
    matcher: RuleMatcher,
    hybrid: Option<HybridAnalyzer>,
}

impl SyndromeAnalyzer {
    pub fn new(matcher: RuleMatcher) -> Self {
        Self {
            matcher,
            hybrid: None,
        }
    }

    pub fn with_hybrid(mut self, hybrid: HybridAnalyzer) -> Self {
        self.hybrid = Some(hybrid);
        self
    }

    pub fn hybrid(&self) -> Option<&HybridAnalyzer> {
        self.hybrid.as_ref()
    }

    pub async fn analyze(&self, features: &[Feature]) -> SyndromeAnalysis {
        let rule = self.matcher.match_syndromes(features);
        let llm = match &self.hybrid {
            Some(hybrid) => hybrid.analyze(features).await,
            None => Vec::new(),
        };

        let syndromes = merge(&rule, &llm);
        let confidence = analysis_confidence(&syndromes);

        info!(
            features = features.len(),
            rule_candidates = rule.len(),
            llm_candidates = llm.len(),
            merged = syndromes.len(),
            confidence = confidence,
            "Syndrome analysis complete"
        );

        SyndromeAnalysis {
            syndromes,
            confidence,
            rule_candidates: rule.len(),
            llm_candidates: llm.len(),
        }
    }
}
