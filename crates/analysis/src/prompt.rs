//! Prompt rendering for the language-model analyzer.

use regex::{Captures, Regex};
use sizhen_common::{Feature, FeatureCategory, Result, SizhenError};
use std::path::Path;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(look|listen|inquiry|palpation)_data\}").unwrap()
});

pub const SYNDROME_SYSTEM_PROMPT: &str = "You are a Traditional Chinese Medicine syndrome-differentiation expert. \
Reason from the four-diagnosis observations you are given and answer only in the requested format.";

pub const DEFAULT_SYNDROME_TEMPLATE: &str = "\
Analyse the following four-diagnosis observations and differentiate the TCM syndromes they indicate.

### Looking
{look_data}

### Listening
{listen_data}

### Inquiry
{inquiry_data}

### Palpation
{palpation_data}

Answer with a section headed `## Syndrome Analysis`. List each syndrome as a bullet \
`- <syndrome name> (<confidence>%)`, followed by `feature: observation` lines for the \
evidence and a short explanation. Order syndromes from most to least likely.
";

pub const FEATURE_SYSTEM_PROMPT: &str = "You are a Traditional Chinese Medicine inspection expert. \
Extract structured tongue and face observations from free-text reports.";

const FEATURE_TEMPLATE: &str = "\
Extract the tongue and face features described in this inspection report.

{report}

Answer with one line per feature in the form `- <feature_name>: <value> (<confidence>%)`, \
using snake_case feature names such as tongue_color, tongue_coating, tongue_shape or face_color.
";

/// The four feature groups of a prompt, one text block each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBlocks {
    pub look: String,
    pub listen: String,
    pub inquiry: String,
    pub palpation: String,
}

impl PromptBlocks {
    pub fn from_features(features: &[Feature]) -> Self {
        let block = |categories: &[FeatureCategory], label: &str| {
            render_block(
                features.iter().filter(|f| categories.contains(&f.category)),
                label,
            )
        };

        Self {
            look: block(&[FeatureCategory::Tongue, FeatureCategory::Face], "looking"),
            listen: block(&[FeatureCategory::Voice], "listening"),
            inquiry: block(&[FeatureCategory::Symptom, FeatureCategory::History], "inquiry"),
            palpation: block(&[FeatureCategory::Pulse], "palpation"),
        }
    }
}

fn render_block<'a>(features: impl Iterator<Item = &'a Feature>, label: &str) -> String {
    let lines: Vec<String> = features
        .map(|f| format!("- {}: {} (confidence: {:.2})", f.name, f.value, f.confidence))
        .collect();

    if lines.is_empty() {
        format!("No {label} data")
    } else {
        lines.join("\n")
    }
}

/// A user-prompt template with `{look_data}`, `{listen_data}`,
/// `{inquiry_data}` and `{palpation_data}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SYNDROME_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path)?;
        if template.trim().is_empty() {
            return Err(SizhenError::Config(format!(
                "Prompt template '{}' is empty",
                path.display()
            )));
        }
        Ok(Self::new(template))
    }

    /// Fill the four data placeholders in one pass over the template.
    ///
    /// Substituted text is never rescanned, so observations that happen to
    /// contain a placeholder stay literal.
    pub fn render(&self, blocks: &PromptBlocks) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "look" => blocks.look.as_str(),
                "listen" => blocks.listen.as_str(),
                "inquiry" => blocks.inquiry.as_str(),
                _ => blocks.palpation.as_str(),
            })
            .into_owned()
    }
}

/// User prompt asking the model to turn a free-text report into feature lines.
pub fn feature_extraction_prompt(report: &str) -> String {
    FEATURE_TEMPLATE.replace("{report}", report.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_group_by_category() {
        let features = vec![
            Feature::new("tongue_color", "red", 0.85, FeatureCategory::Tongue),
            Feature::new("face_color", "pale", 0.5, FeatureCategory::Face),
            Feature::new("fatigue", "severe", 0.9, FeatureCategory::Symptom),
            Feature::new("surgery", "appendix", 1.0, FeatureCategory::History),
        ];

        let blocks = PromptBlocks::from_features(&features);
        assert_eq!(
            blocks.look,
            "- tongue_color: red (confidence: 0.85)\n- face_color: pale (confidence: 0.50)"
        );
        assert_eq!(blocks.listen, "No listening data");
        assert!(blocks.inquiry.contains("fatigue: severe"));
        assert!(blocks.inquiry.contains("surgery: appendix"));
        assert_eq!(blocks.palpation, "No palpation data");
    }

    #[test]
    fn template_substitutes_every_placeholder() {
        let blocks = PromptBlocks::from_features(&[]);
        let prompt = PromptTemplate::default().render(&blocks);
        assert!(!prompt.contains("{look_data}"));
        assert!(!prompt.contains("{palpation_data}"));
        assert!(prompt.contains("No looking data"));
        assert!(prompt.contains("## Syndrome Analysis"));
    }

    #[test]
    fn placeholder_text_in_observations_stays_literal() {
        let features = vec![
            Feature::new("tongue_note", "{inquiry_data}", 0.8, FeatureCategory::Tongue),
            Feature::new("fatigue", "severe", 0.9, FeatureCategory::Symptom),
        ];
        let blocks = PromptBlocks::from_features(&features);

        let prompt = PromptTemplate::new("L={look_data}\nI={inquiry_data}").render(&blocks);
        assert_eq!(
            prompt,
            "L=- tongue_note: {inquiry_data} (confidence: 0.80)\n\
             I=- fatigue: severe (confidence: 0.90)"
        );
    }

    #[test]
    fn custom_template_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "L={look_data} P={palpation_data}").unwrap();

        let template = PromptTemplate::from_file(file.path()).unwrap();
        let blocks = PromptBlocks::from_features(&[Feature::new(
            "pulse_type",
            "wiry",
            0.9,
            FeatureCategory::Pulse,
        )]);
        assert_eq!(
            template.render(&blocks),
            "L=No looking data P=- pulse_type: wiry (confidence: 0.90)"
        );
    }

    #[test]
    fn empty_template_file_is_config_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            PromptTemplate::from_file(file.path()),
            Err(SizhenError::Config(_))
        ));
    }

    #[test]
    fn feature_prompt_embeds_report() {
        let prompt = feature_extraction_prompt("  Tongue is pale with teeth marks.  ");
        assert!(prompt.contains("Tongue is pale with teeth marks."));
        assert!(!prompt.contains("{report}"));
    }
}
