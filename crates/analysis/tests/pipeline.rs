//! End-to-end analysis over fused features with the built-in rule library.

use async_trait::async_trait;
use sizhen_analysis::{
    summarize, synthesize, ConstitutionAssessor, EvidencePolicy, HybridAnalyzer, RuleLibrary,
    RuleMatcher, SyndromeAnalyzer,
};
use sizhen_common::{
    fuse_features, DiagnosisResult, DiagnosisType, Feature, FeatureCategory, RecommendationType,
    Result,
};
use sizhen_llm::{LlmClient, LlmRequest, LlmResponse};
use std::sync::Arc;

struct CannedModel;

#[async_trait]
impl LlmClient for CannedModel {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse::text(
            "Here is my assessment.\n\n\
             ## Syndrome Analysis\n\
             - Spleen-Stomach Damp-Heat (80%)\n  \
               tongue_coating: yellow greasy\n  \
               bitter_taste: present\n  \
               Damp-heat obstructs the middle burner.\n\
             - Liver Qi Stagnation (40%)\n\n\
             ## Advice\n\
             - Drink more water",
        ))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

fn result(diagnosis_type: DiagnosisType, features: Vec<Feature>) -> DiagnosisResult {
    DiagnosisResult {
        diagnosis_id: format!("{}-1", diagnosis_type.label()),
        diagnosis_type,
        source_service: diagnosis_type.service_id().to_string(),
        confidence: 0.85,
        features,
        detailed_result: String::new(),
        timestamp: 0,
    }
}

fn damp_heat_results() -> Vec<DiagnosisResult> {
    vec![
        result(
            DiagnosisType::Looking,
            vec![
                Feature::new("tongue_coating", "yellow_greasy", 0.9, FeatureCategory::Tongue),
                Feature::new("tongue_color", "red", 0.8, FeatureCategory::Tongue),
                Feature::new("face_color", "greasy", 0.7, FeatureCategory::Face),
            ],
        ),
        result(
            DiagnosisType::Inquiry,
            vec![
                Feature::new("bitter_taste", "present", 0.9, FeatureCategory::Symptom),
                Feature::new("sticky_stool", "moderate", 0.8, FeatureCategory::Symptom),
            ],
        ),
        result(
            DiagnosisType::Palpation,
            vec![Feature::new("pulse_type", "slippery_rapid", 0.85, FeatureCategory::Pulse)],
        ),
    ]
}

#[tokio::test]
async fn damp_heat_case_end_to_end() {
    let library = Arc::new(RuleLibrary::builtin().unwrap());
    let results = damp_heat_results();
    let features = fuse_features(&results);
    let contributing: Vec<_> = results.iter().map(|r| r.diagnosis_type).collect();

    let analyzer = SyndromeAnalyzer::new(
        RuleMatcher::new(library.clone())
            .with_confidence_threshold(0.7)
            .with_policy(EvidencePolicy::Moderate),
    )
    .with_hybrid(HybridAnalyzer::new(Arc::new(CannedModel)));

    let analysis = analyzer.analyze(&features).await;
    let primary = &analysis.syndromes[0];
    assert_eq!(primary.id, "spleen_stomach_damp_heat");
    assert_eq!(primary.category, "damp_heat");
    assert_eq!(primary.description, "Damp-heat obstructs the middle burner.");
    // Model evidence only adds feature names the rules did not already cite.
    let cited: Vec<_> = primary
        .evidences
        .iter()
        .map(|e| e.feature_name.as_str())
        .collect();
    assert_eq!(
        cited.iter().filter(|n| **n == "tongue_coating").count(),
        1
    );
    assert!(analysis
        .syndromes
        .iter()
        .any(|s| s.name == "Liver Qi Stagnation" && (s.confidence - 0.32).abs() < 1e-9));

    let constitutions = ConstitutionAssessor::new(library).assess(&features);
    assert_eq!(constitutions[0].type_id, "damp_heat");
    assert_eq!(constitutions.iter().filter(|c| c.is_primary).count(), 1);

    let recommendations = synthesize(&analysis.syndromes, &constitutions, &contributing);
    assert_eq!(recommendations[0].priority, 5);
    assert!(recommendations
        .iter()
        .any(|r| r.recommendation_type == RecommendationType::FollowUp
            && r.content.contains("listening")));

    let summary = summarize(&contributing, &analysis.syndromes, &constitutions, &recommendations);
    assert!(summary.contains("Spleen-Stomach Damp-Heat"));
    assert!(summary.contains("Damp-Heat"));
    assert!(summary.starts_with("Based on the looking, inquiry and palpation diagnosis"));
}

#[tokio::test]
async fn sparse_features_still_produce_assessment() {
    let library = Arc::new(RuleLibrary::builtin().unwrap());
    let results = vec![result(
        DiagnosisType::Listening,
        vec![Feature::new("voice_strength", "weak", 0.8, FeatureCategory::Voice)],
    )];
    let features = fuse_features(&results);

    let analysis = SyndromeAnalyzer::new(RuleMatcher::new(library.clone()))
        .analyze(&features)
        .await;
    assert!(analysis.syndromes.is_empty());
    assert_eq!(analysis.confidence, 0.0);

    let constitutions = ConstitutionAssessor::new(library).assess(&features);
    assert_eq!(constitutions[0].type_id, "qi_deficiency");

    let recommendations =
        synthesize(&analysis.syndromes, &constitutions, &[DiagnosisType::Listening]);
    assert_eq!(
        recommendations[0].recommendation_type,
        RecommendationType::Consultation
    );
}
