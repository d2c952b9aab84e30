//! Constitution (body-type) assessment.

use crate::rules::{ConstitutionArchetype, RuleLibrary};
use sizhen_common::{ConstitutionScore, Evidence, Feature};
use std::sync::Arc;
use tracing::debug;

/// Minimum score for an archetype to count as a tendency.
pub const TENDENCY_THRESHOLD: f64 = 0.4;
pub const MAX_TENDENCIES: usize = 3;

pub const BALANCED: &str = "balanced";
pub const QI_DEFICIENCY: &str = "qi_deficiency";
pub const YANG_DEFICIENCY: &str = "yang_deficiency";
pub const YIN_DEFICIENCY: &str = "yin_deficiency";
pub const PHLEGM_DAMPNESS: &str = "phlegm_dampness";
pub const DAMP_HEAT: &str = "damp_heat";
pub const BLOOD_STASIS: &str = "blood_stasis";
pub const QI_STAGNATION: &str = "qi_stagnation";
pub const SPECIAL_DIATHESIS: &str = "special_diathesis";

/// Tendency pairs that call for a combined note, with the note itself.
const COMBINATIONS: [(&str, &str, &str); 3] = [
    (
        QI_DEFICIENCY,
        YANG_DEFICIENCY,
        "Qi and yang are both deficient: warm and tonify qi and yang and avoid overexertion.",
    ),
    (
        YIN_DEFICIENCY,
        DAMP_HEAT,
        "Yin deficiency with damp-heat: nourish yin while clearing heat and avoid spicy, drying foods.",
    ),
    (
        QI_STAGNATION,
        BLOOD_STASIS,
        "Qi stagnation with blood stasis: soothe the liver, move qi and invigorate blood circulation.",
    ),
];

pub struct ConstitutionAssessor {
    library: Arc<RuleLibrary>,
}

impl ConstitutionAssessor {
    pub fn new(library: Arc<RuleLibrary>) -> Self {
        Self { library }
    }

    /// Score every archetype against the fused features.
    ///
    /// Only positive scores are returned, highest first; ties keep the
    /// archetype declaration order. The first entry is the primary one.
    pub fn assess(&self, features: &[Feature]) -> Vec<ConstitutionScore> {
        if features.is_empty() {
            return Vec::new();
        }

        let mut scores: Vec<ConstitutionScore> = self
            .library
            .constitutions
            .iter()
            .map(|archetype| score_archetype(archetype, features))
            .filter(|score| score.score > 0.0)
            .collect();

        // Stable sort keeps declaration order between equal scores.
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(primary) = scores.first_mut() {
            primary.is_primary = true;
        }

        debug!(
            archetypes = self.library.constitutions.len(),
            scored = scores.len(),
            primary = scores.first().map(|s| s.type_id.as_str()).unwrap_or("none"),
            "Constitution assessment complete"
        );
        scores
    }
}

fn score_archetype(archetype: &ConstitutionArchetype, features: &[Feature]) -> ConstitutionScore {
    let mut evidences = Vec::new();
    let mut total_weight = 0.0;
    let mut weighted = 0.0;

    for indicator in &archetype.indicators {
        total_weight += indicator.weight;
        let matched = features
            .iter()
            .find(|f| f.name == indicator.name && indicator.values.iter().any(|v| *v == f.value));
        if let Some(feature) = matched {
            weighted += indicator.weight * feature.confidence;
            evidences.push(Evidence::new(&feature.name, &feature.value, indicator.weight));
        }
    }

    let score = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    ConstitutionScore {
        type_id: archetype.type_id.clone(),
        type_name: archetype.type_name.clone(),
        score,
        description: archetype.description.clone(),
        is_primary: false,
        evidences,
    }
}

/// Archetypes scoring at least [`TENDENCY_THRESHOLD`], at most three, in rank order.
pub fn tendencies(scores: &[ConstitutionScore]) -> Vec<&ConstitutionScore> {
    scores
        .iter()
        .filter(|s| s.score >= TENDENCY_THRESHOLD)
        .take(MAX_TENDENCIES)
        .collect()
}

/// Notes for known tendency combinations.
pub fn combination_notes(scores: &[ConstitutionScore]) -> Vec<&'static str> {
    let tendency_ids: Vec<&str> = tendencies(scores)
        .into_iter()
        .map(|s| s.type_id.as_str())
        .collect();

    COMBINATIONS
        .iter()
        .filter(|(a, b, _)| tendency_ids.contains(a) && tendency_ids.contains(b))
        .map(|(_, _, note)| *note)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizhen_common::FeatureCategory;

    fn f(name: &str, value: &str, confidence: f64) -> Feature {
        Feature::new(name, value, confidence, FeatureCategory::Symptom)
    }

    fn assessor() -> ConstitutionAssessor {
        ConstitutionAssessor::new(Arc::new(RuleLibrary::builtin().unwrap()))
    }

    fn score(id: &str, value: f64) -> ConstitutionScore {
        ConstitutionScore {
            type_id: id.into(),
            type_name: id.into(),
            score: value,
            description: String::new(),
            is_primary: false,
            evidences: vec![],
        }
    }

    #[test]
    fn no_features_no_scores() {
        assert!(assessor().assess(&[]).is_empty());
    }

    #[test]
    fn exactly_one_primary_and_sorted() {
        let features = vec![
            f("fatigue", "severe", 0.9),
            f("spontaneous_sweating", "present", 0.8),
            f("pulse_type", "weak", 0.7),
            f("cold_limbs", "present", 0.6),
        ];

        let scores = assessor().assess(&features);
        assert!(!scores.is_empty());
        assert_eq!(scores.iter().filter(|s| s.is_primary).count(), 1);
        assert!(scores[0].is_primary);
        assert_eq!(scores[0].type_id, QI_DEFICIENCY);
        assert!(scores.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(scores.iter().all(|s| s.score > 0.0 && s.score <= 1.0));
    }

    #[test]
    fn weighted_score_and_evidence() {
        let library = RuleLibrary::from_json_str(
            r#"{"version":"t","constitutions":[
                {"type_id":"a","type_name":"A","indicators":[
                    {"name":"x","values":["1"],"weight":1.0},
                    {"name":"y","values":["1"],"weight":3.0}
                ]}
            ]}"#,
        )
        .unwrap();
        let scores = ConstitutionAssessor::new(Arc::new(library)).assess(&[f("y", "1", 0.5)]);

        assert_eq!(scores.len(), 1);
        assert!((scores[0].score - 0.375).abs() < 1e-9);
        assert_eq!(scores[0].evidences, vec![Evidence::new("y", "1", 3.0)]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let library = RuleLibrary::from_json_str(
            r#"{"version":"t","constitutions":[
                {"type_id":"first","type_name":"First","indicators":[{"name":"x","values":["1"],"weight":1.0}]},
                {"type_id":"second","type_name":"Second","indicators":[{"name":"x","values":["1"],"weight":2.0}]}
            ]}"#,
        )
        .unwrap();
        let scores = ConstitutionAssessor::new(Arc::new(library)).assess(&[f("x", "1", 0.9)]);

        assert_eq!(scores[0].type_id, "first");
        assert!(scores[0].is_primary);
        assert!(!scores[1].is_primary);
    }

    #[test]
    fn unmatched_features_yield_empty_list() {
        assert!(assessor().assess(&[f("unrelated", "thing", 1.0)]).is_empty());
    }

    #[test]
    fn tendencies_are_capped_and_thresholded() {
        let scores = vec![
            score("a", 0.9),
            score("b", 0.6),
            score("c", 0.45),
            score("d", 0.41),
            score("e", 0.2),
        ];
        let ids: Vec<_> = tendencies(&scores).iter().map(|s| s.type_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn combination_notes_need_both_tendencies() {
        let scores = vec![score(QI_DEFICIENCY, 0.7), score(YANG_DEFICIENCY, 0.5)];
        assert_eq!(combination_notes(&scores).len(), 1);

        let scores = vec![score(QI_DEFICIENCY, 0.7), score(YANG_DEFICIENCY, 0.3)];
        assert!(combination_notes(&scores).is_empty());
    }
}
