//! Consensus merge of rule-derived and model-derived syndrome candidates.

use sizhen_common::{sanitize_confidence, SyndromeCandidate};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub const RULE_WEIGHT: f64 = 0.7;
pub const LLM_WEIGHT: f64 = 0.3;
/// Applied to candidates only the model proposed
pub const LLM_ONLY_ATTENUATION: f64 = 0.8;

/// Merge two candidate lists by syndrome name.
///
/// The result does not depend on the order of either input, is sorted by
/// descending confidence (ties by name) and every confidence is in `[0, 1]`.
pub fn merge(rule: &[SyndromeCandidate], llm: &[SyndromeCandidate]) -> Vec<SyndromeCandidate> {
    let rule_index = index_by_name(rule);
    let llm_index = index_by_name(llm);

    let names: BTreeSet<&str> = rule_index.keys().chain(llm_index.keys()).copied().collect();

    let mut merged: Vec<SyndromeCandidate> = names
        .into_iter()
        .filter_map(|name| match (rule_index.get(name), llm_index.get(name)) {
            (Some(r), Some(l)) => Some(combine(r, l)),
            (Some(r), None) => Some((*r).clone()),
            (None, Some(l)) => {
                let mut only = (*l).clone();
                only.confidence *= LLM_ONLY_ATTENUATION;
                Some(only)
            }
            (None, None) => None,
        })
        .map(|mut candidate| {
            candidate.confidence = sanitize_confidence(candidate.confidence);
            candidate
        })
        .collect();

    merged.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
    });
    merged
}

/// Mean confidence of the merged candidates, 0.0 when there are none.
pub fn analysis_confidence(candidates: &[SyndromeCandidate]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    let total: f64 = candidates.iter().map(|c| c.confidence).sum();
    sanitize_confidence(total / candidates.len() as f64)
}

fn combine(rule: &SyndromeCandidate, llm: &SyndromeCandidate) -> SyndromeCandidate {
    let mut merged = rule.clone();
    merged.confidence = rule.confidence * RULE_WEIGHT + llm.confidence * LLM_WEIGHT;

    let known: BTreeSet<&str> = rule
        .evidences
        .iter()
        .map(|e| e.feature_name.as_str())
        .collect();
    merged.evidences.extend(
        llm.evidences
            .iter()
            .filter(|e| !known.contains(e.feature_name.as_str()))
            .cloned(),
    );

    if !llm.description.is_empty() {
        merged.description = llm.description.clone();
    }
    merged
}

/// Index by name; duplicates keep the highest confidence, then the smallest id.
fn index_by_name(candidates: &[SyndromeCandidate]) -> BTreeMap<&str, &SyndromeCandidate> {
    let mut index: BTreeMap<&str, &SyndromeCandidate> = BTreeMap::new();
    for candidate in candidates {
        index
            .entry(candidate.name.as_str())
            .and_modify(|kept| {
                if prefer(candidate, kept) == Ordering::Greater {
                    *kept = candidate;
                }
            })
            .or_insert(candidate);
    }
    index
}

fn prefer(a: &SyndromeCandidate, b: &SyndromeCandidate) -> Ordering {
    a.confidence
        .total_cmp(&b.confidence)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizhen_common::Evidence;

    fn c(name: &str, confidence: f64) -> SyndromeCandidate {
        SyndromeCandidate::new(format!("id:{name}"), name, confidence)
    }

    #[test]
    fn worked_example() {
        let rule = vec![c("A", 0.9)];
        let llm = vec![c("A", 0.6), c("B", 0.5)];

        let merged = merge(&rule, &llm);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "A");
        assert!((merged[0].confidence - 0.81).abs() < 1e-9);
        assert_eq!(merged[1].name, "B");
        assert!((merged[1].confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn rule_only_passes_through_unchanged() {
        let rule = vec![c("A", 0.72).with_description("rule text").with_category("damp_heat")];
        let merged = merge(&rule, &[]);
        assert_eq!(merged, rule);
    }

    #[test]
    fn shared_name_unions_evidence_and_prefers_llm_description() {
        let rule = vec![c("A", 0.8)
            .with_category("qi_stagnation")
            .with_description("from rules")
            .with_evidence(Evidence::new("pulse_type", "wiry", 1.0))];
        let llm = vec![SyndromeCandidate::new("llm:A", "A", 0.8)
            .with_description("from model")
            .with_evidence(Evidence::new("pulse_type", "slippery", 1.0))
            .with_evidence(Evidence::new("sighing", "present", 1.0))];

        let merged = merge(&rule, &llm);
        let a = &merged[0];
        assert_eq!(a.id, "id:A");
        assert_eq!(a.category, "qi_stagnation");
        assert_eq!(a.description, "from model");
        let names: Vec<_> = a.evidences.iter().map(|e| e.feature_name.as_str()).collect();
        assert_eq!(names, vec!["pulse_type", "sighing"]);
        assert_eq!(a.evidences[0].feature_value, "wiry");
    }

    #[test]
    fn empty_llm_description_keeps_rule_description() {
        let rule = vec![c("A", 0.8).with_description("from rules")];
        let llm = vec![c("A", 0.9)];
        assert_eq!(merge(&rule, &llm)[0].description, "from rules");
    }

    #[test]
    fn order_of_inputs_does_not_matter() {
        let rule = vec![c("A", 0.9), c("C", 0.75), c("D", 0.75)];
        let llm = vec![c("B", 0.5), c("A", 0.6), c("E", 0.9)];

        let forward = merge(&rule, &llm);
        let mut rule_rev = rule.clone();
        rule_rev.reverse();
        let mut llm_rev = llm.clone();
        llm_rev.reverse();
        let backward = merge(&rule_rev, &llm_rev);

        assert_eq!(forward, backward);
        let names: Vec<_> = forward.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "D", "E", "B"]);
    }

    #[test]
    fn re_merge_is_byte_identical() {
        let rule = vec![c("A", 0.9), c("B", 0.7)];
        let llm = vec![c("B", 0.4), c("C", 0.65)];

        let first = serde_json::to_string(&merge(&rule, &llm)).unwrap();
        let second = serde_json::to_string(&merge(&rule, &llm)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_names_keep_highest_confidence() {
        let llm = vec![
            SyndromeCandidate::new("llm:b", "A", 0.5),
            SyndromeCandidate::new("llm:z", "A", 0.9),
            SyndromeCandidate::new("llm:a", "A", 0.9),
        ];
        let merged = merge(&[], &llm);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "llm:a");
        assert!((merged[0].confidence - 0.72).abs() < 1e-9);
    }

    #[test]
    fn merged_confidences_stay_in_range_and_sorted() {
        let mut out_of_range = c("A", 0.5);
        out_of_range.confidence = 7.0;
        let merged = merge(&[out_of_range], &[c("B", 1.0)]);
        assert!(merged.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
        assert!(merged.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn analysis_confidence_is_mean() {
        assert_eq!(analysis_confidence(&[]), 0.0);
        let merged = merge(&[c("A", 0.9)], &[c("A", 0.6), c("B", 0.5)]);
        assert!((analysis_confidence(&merged) - 0.605).abs() < 1e-9);
    }
}
