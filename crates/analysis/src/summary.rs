//! One-paragraph narrative of an assembled analysis.

use crate::constitution::tendencies;
use sizhen_common::{ConstitutionScore, DiagnosisType, Recommendation, SyndromeCandidate};

const CLOSING: &str = "This assessment is for health reference only; please consult a qualified TCM practitioner before starting any treatment.";

/// Build the summary paragraph.
pub fn summarize(
    contributing: &[DiagnosisType],
    syndromes: &[SyndromeCandidate],
    constitutions: &[ConstitutionScore],
    recommendations: &[Recommendation],
) -> String {
    let mut sentences = Vec::new();

    let labels: Vec<&str> = contributing.iter().map(|t| t.label()).collect();
    sentences.push(format!(
        "Based on the {} diagnosis, ",
        join_with_and(&labels)
    ));

    match syndromes.first() {
        Some(primary) => sentences[0].push_str(&format!(
            "the primary syndrome is {} (confidence {:.0}%).",
            primary.name,
            primary.confidence * 100.0
        )),
        None => sentences[0].push_str("no syndrome met the confidence threshold."),
    }

    match constitutions.iter().find(|c| c.is_primary) {
        Some(primary) => {
            let others: Vec<&str> = tendencies(constitutions)
                .into_iter()
                .filter(|s| !s.is_primary)
                .map(|s| s.type_name.as_str())
                .collect();
            if others.is_empty() {
                sentences.push(format!("The primary constitution is {}.", primary.type_name));
            } else {
                sentences.push(format!(
                    "The primary constitution is {}, with {} tendencies.",
                    primary.type_name,
                    join_with_and(&others)
                ));
            }
        }
        None => sentences.push(
            "The constitution could not be determined from the available features.".to_string(),
        ),
    }

    let top: Vec<&str> = recommendations
        .iter()
        .take(2)
        .map(|r| r.content.trim_end_matches('.'))
        .collect();
    if !top.is_empty() {
        sentences.push(format!("Key recommendations: {}.", top.join("; ")));
    }

    sentences.push(CLOSING.to_string());
    sentences.join(" ")
}

fn join_with_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizhen_common::RecommendationType;

    fn constitution(type_name: &str, score: f64, primary: bool) -> ConstitutionScore {
        ConstitutionScore {
            type_id: type_name.to_lowercase(),
            type_name: type_name.into(),
            score,
            description: String::new(),
            is_primary: primary,
            evidences: vec![],
        }
    }

    #[test]
    fn full_summary_mentions_everything() {
        let summary = summarize(
            &[DiagnosisType::Looking, DiagnosisType::Inquiry, DiagnosisType::Palpation],
            &[SyndromeCandidate::new("s", "Liver Qi Stagnation", 0.82)],
            &[
                constitution("Qi Stagnation", 0.7, true),
                constitution("Blood Stasis", 0.5, false),
                constitution("Balanced", 0.1, false),
            ],
            &[
                Recommendation::new(RecommendationType::Diet, "Eat citrus.", "r", 5),
                Recommendation::new(RecommendationType::Exercise, "Go hiking.", "r", 4),
                Recommendation::new(RecommendationType::Lifestyle, "Sleep early.", "r", 2),
            ],
        );

        assert!(summary.starts_with("Based on the looking, inquiry and palpation diagnosis"));
        assert!(summary.contains("Liver Qi Stagnation (confidence 82%)"));
        assert!(summary.contains("The primary constitution is Qi Stagnation, with Blood Stasis tendencies."));
        assert!(summary.contains("Key recommendations: Eat citrus; Go hiking."));
        assert!(!summary.contains("Sleep early"));
        assert!(summary.ends_with(CLOSING));
        assert!(!summary.contains('\n'));
    }

    #[test]
    fn summary_without_syndrome_or_constitution() {
        let summary = summarize(&[DiagnosisType::Listening], &[], &[], &[]);
        assert!(summary.contains("Based on the listening diagnosis"));
        assert!(summary.contains("no syndrome met the confidence threshold"));
        assert!(summary.contains("could not be determined"));
        assert!(!summary.contains("Key recommendations"));
    }
}
