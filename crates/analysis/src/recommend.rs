//! Recommendation synthesis from the primary syndrome and constitution.
//!
//! Recommendations come from fixed template tables, so the same analysis
//! always yields the same list.

use crate::constitution::{combination_notes, SPECIAL_DIATHESIS};
use sizhen_common::{
    ConstitutionScore, DiagnosisType, Recommendation, RecommendationType, SyndromeCandidate,
};

/// A primary syndrome below this confidence triggers a consultation advice.
pub const CONSULTATION_THRESHOLD: f64 = 0.6;

const SYNDROME_PRIMARY_PRIORITY: i32 = 5;
const SYNDROME_SECONDARY_PRIORITY: i32 = 4;
const CONSTITUTION_PRIMARY_PRIORITY: i32 = 3;
const CONSTITUTION_SECONDARY_PRIORITY: i32 = 2;
const FOLLOW_UP_PRIORITY: i32 = 1;

struct SyndromeTemplate {
    category: &'static str,
    diet: &'static str,
    secondary: (RecommendationType, &'static str),
}

const SYNDROME_TEMPLATES: &[SyndromeTemplate] = &[
    SyndromeTemplate {
        category: "damp_heat",
        diet: "Favour light foods that clear heat and drain dampness, such as mung beans, winter melon and bitter gourd; avoid greasy, spicy food and alcohol.",
        secondary: (RecommendationType::Lifestyle, "Keep living spaces dry and ventilated and avoid staying up late."),
    },
    SyndromeTemplate {
        category: "qi_stagnation",
        diet: "Eat foods that move qi and relieve constraint, such as citrus peel, pomelo and rose tea.",
        secondary: (RecommendationType::Exercise, "Take regular outdoor exercise such as brisk walking, jogging or hiking to ease the flow of qi."),
    },
    SyndromeTemplate {
        category: "qi_deficiency",
        diet: "Eat warm, easily digested foods that strengthen the spleen and replenish qi, such as Chinese yam, jujube and millet porridge.",
        secondary: (RecommendationType::Exercise, "Choose gentle exercise such as walking or tai chi and avoid exhausting workouts."),
    },
    SyndromeTemplate {
        category: "yang_deficiency",
        diet: "Prefer warming foods such as lamb, ginger and chives, and limit raw or cold food and drinks.",
        secondary: (RecommendationType::Lifestyle, "Keep the back, abdomen and feet warm and go to bed early."),
    },
    SyndromeTemplate {
        category: "yin_deficiency",
        diet: "Eat sweet-cool, moistening foods such as lily bulb, goji berries and white fungus; avoid spicy and fried food.",
        secondary: (RecommendationType::Lifestyle, "Keep a regular sleep schedule, avoid late nights and avoid heavy sweating."),
    },
    SyndromeTemplate {
        category: "phlegm_dampness",
        diet: "Keep meals light and low in salt and sugar, with foods that resolve dampness such as coix seed and poria.",
        secondary: (RecommendationType::Exercise, "Build up to sustained aerobic exercise such as jogging or swimming."),
    },
    SyndromeTemplate {
        category: "blood_stasis",
        diet: "Include foods that invigorate blood, such as hawthorn, black fungus and a little vinegar.",
        secondary: (RecommendationType::Exercise, "Practise movement that promotes circulation, such as tai chi or baduanjin, and avoid prolonged sitting."),
    },
];

struct ConstitutionTemplate {
    type_id: &'static str,
    diet: &'static str,
    exercise: &'static str,
    lifestyle: &'static str,
    emotion: &'static str,
}

const CONSTITUTION_TEMPLATES: &[ConstitutionTemplate] = &[
    ConstitutionTemplate {
        type_id: "balanced",
        diet: "Eat regular, moderate meals and avoid food that is too cold, too hot or unclean.",
        exercise: "Most forms of exercise suit you, including running, martial arts and ball games.",
        lifestyle: "Keep regular hours, balance work and rest and sleep enough.",
        emotion: "Maintain a calm outlook and avoid emotional extremes.",
    },
    ConstitutionTemplate {
        type_id: "qi_deficiency",
        diet: "Prefer neutral to warm foods that strengthen the spleen and qi, such as jujube, Chinese yam and millet.",
        exercise: "Choose gentle, soft exercise such as walking or tai chi.",
        lifestyle: "Avoid overwork and make sure to get enough sleep.",
        emotion: "Stay optimistic and avoid excessive worry.",
    },
    ConstitutionTemplate {
        type_id: "yang_deficiency",
        diet: "Prefer warming foods such as lamb, chives and ginger; eat little raw or cold food.",
        exercise: "Choose gentle exercise and avoid heavy sweating.",
        lifestyle: "Keep warm, especially the back and lower limbs, and avoid staying up late.",
        emotion: "Keep a positive attitude and spend time with other people.",
    },
    ConstitutionTemplate {
        type_id: "yin_deficiency",
        diet: "Prefer sweet-cool, moistening foods such as lily bulb, goji berries and white fungus.",
        exercise: "Keep exercise at low to moderate intensity and avoid heavy sweating.",
        lifestyle: "Keep a regular routine, avoid late nights and sleep enough.",
        emotion: "Keep a peaceful mind and avoid agitation.",
    },
    ConstitutionTemplate {
        type_id: "phlegm_dampness",
        diet: "Eat light meals low in salt and sugar, with foods that strengthen the spleen and drain dampness.",
        exercise: "Take regular, sustained exercise such as running or swimming.",
        lifestyle: "Live in a dry environment and avoid damp places.",
        emotion: "Stay cheerful and take part in social activities.",
    },
    ConstitutionTemplate {
        type_id: "damp_heat",
        diet: "Prefer foods that clear heat and drain dampness, such as mung beans, winter melon and bitter gourd.",
        exercise: "Vigorous, high-volume exercise suits you.",
        lifestyle: "Keep living spaces dry and ventilated and avoid staying up late.",
        emotion: "Stay even-tempered and avoid irritability.",
    },
    ConstitutionTemplate {
        type_id: "blood_stasis",
        diet: "Include foods that invigorate blood, such as hawthorn, vinegar and rose tea.",
        exercise: "Practise exercise that moves qi and blood, such as tai chi or baduanjin.",
        lifestyle: "Keep a regular routine and avoid sitting or standing for long periods.",
        emotion: "Keep a relaxed mood and avoid brooding.",
    },
    ConstitutionTemplate {
        type_id: "qi_stagnation",
        diet: "Prefer foods that move qi, such as citrus, pomelo and finger citron.",
        exercise: "Exercise outdoors, for example jogging, hiking or swimming.",
        lifestyle: "Keep regular hours and a quiet sleeping environment.",
        emotion: "Seek enjoyable activities and company to keep your mood light.",
    },
    ConstitutionTemplate {
        type_id: "special_diathesis",
        diet: "Eat plain food and avoid known allergens and foods that commonly provoke reactions.",
        exercise: "Choose mild exercise and avoid strenuous workouts.",
        lifestyle: "Keep your home free of pollen, dust and other allergens.",
        emotion: "Keep a steady mood and avoid emotional swings.",
    },
];

/// Derive recommendations, highest priority first.
///
/// `contributing` lists the modalities whose results fed the analysis.
pub fn synthesize(
    syndromes: &[SyndromeCandidate],
    constitutions: &[ConstitutionScore],
    contributing: &[DiagnosisType],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let primary_syndrome = syndromes.first();

    if let Some(syndrome) = primary_syndrome {
        recommendations.extend(syndrome_recommendations(syndrome));
    }

    if primary_syndrome.map_or(true, |s| s.confidence < CONSULTATION_THRESHOLD) {
        let reason = match primary_syndrome {
            Some(s) => format!(
                "The leading syndrome '{}' has low confidence ({:.0}%).",
                s.name,
                s.confidence * 100.0
            ),
            None => "No syndrome could be identified with sufficient confidence.".to_string(),
        };
        recommendations.push(
            Recommendation::new(
                RecommendationType::Consultation,
                "Consult a qualified TCM practitioner for an in-person four-diagnosis examination.",
                reason,
                SYNDROME_PRIMARY_PRIORITY,
            )
            .with_metadata("source", "confidence"),
        );
    }

    if let Some(primary) = constitutions.iter().find(|c| c.is_primary) {
        recommendations.extend(constitution_recommendations(primary));
    }

    for note in combination_notes(constitutions) {
        recommendations.push(
            Recommendation::new(
                RecommendationType::Lifestyle,
                note,
                "Several constitution tendencies are present together.",
                CONSTITUTION_SECONDARY_PRIORITY,
            )
            .with_metadata("source", "constitution_combination"),
        );
    }

    if constitutions
        .iter()
        .any(|c| c.is_primary && c.type_id == SPECIAL_DIATHESIS)
    {
        recommendations.push(
            Recommendation::new(
                RecommendationType::FollowUp,
                "Avoid known allergens and arrange regular health check-ups.",
                "A special diathesis constitution reacts strongly to allergens.",
                FOLLOW_UP_PRIORITY,
            )
            .with_metadata("source", "constitution")
            .with_metadata("constitution_type", SPECIAL_DIATHESIS),
        );
    }

    let missing: Vec<&str> = DiagnosisType::ALL
        .iter()
        .filter(|t| !contributing.contains(t))
        .map(|t| t.label())
        .collect();
    if !missing.is_empty() {
        recommendations.push(
            Recommendation::new(
                RecommendationType::FollowUp,
                format!(
                    "Complete the missing {} diagnosis to refine this assessment.",
                    missing.join(", ")
                ),
                format!(
                    "Only {} of the four diagnostic methods contributed.",
                    4 - missing.len()
                ),
                FOLLOW_UP_PRIORITY,
            )
            .with_metadata("source", "coverage"),
        );
    }

    // Stable: equal priorities keep insertion order.
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

fn syndrome_recommendations(syndrome: &SyndromeCandidate) -> Vec<Recommendation> {
    let tag = |r: Recommendation| {
        r.with_metadata("source", "syndrome")
            .with_metadata("syndrome_id", &syndrome.id)
    };
    let reason = format!("Indicated by the syndrome '{}'.", syndrome.name);

    match SYNDROME_TEMPLATES
        .iter()
        .find(|t| t.category == syndrome.category)
    {
        Some(template) => {
            let (secondary_type, secondary) = template.secondary;
            vec![
                tag(Recommendation::new(
                    RecommendationType::Diet,
                    template.diet,
                    reason.clone(),
                    SYNDROME_PRIMARY_PRIORITY,
                )),
                tag(Recommendation::new(
                    secondary_type,
                    secondary,
                    reason,
                    SYNDROME_SECONDARY_PRIORITY,
                )),
            ]
        }
        None => vec![tag(Recommendation::new(
            RecommendationType::Lifestyle,
            format!(
                "Follow a regulation plan for {} under the guidance of a TCM practitioner.",
                syndrome.name
            ),
            reason,
            SYNDROME_SECONDARY_PRIORITY,
        ))],
    }
}

fn constitution_recommendations(score: &ConstitutionScore) -> Vec<Recommendation> {
    let Some(template) = CONSTITUTION_TEMPLATES
        .iter()
        .find(|t| t.type_id == score.type_id)
    else {
        return Vec::new();
    };

    let reason = format!("Suited to a {} constitution.", score.type_name);
    [
        (RecommendationType::Diet, template.diet, CONSTITUTION_PRIMARY_PRIORITY),
        (RecommendationType::Exercise, template.exercise, CONSTITUTION_PRIMARY_PRIORITY),
        (RecommendationType::Lifestyle, template.lifestyle, CONSTITUTION_SECONDARY_PRIORITY),
        (RecommendationType::Lifestyle, template.emotion, CONSTITUTION_SECONDARY_PRIORITY),
    ]
    .into_iter()
    .map(|(kind, content, priority)| {
        Recommendation::new(kind, content, reason.clone(), priority)
            .with_metadata("source", "constitution")
            .with_metadata("constitution_type", &score.type_id)
    })
    .collect()
}
