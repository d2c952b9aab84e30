//! Line-based parser for free-text language-model replies.
//!
//! Two shapes are understood:
//!
//! * syndrome analyses, where each bullet opens a candidate, at any
//!   indentation (`- Liver Qi Stagnation (75%)`), and the plain lines
//!   below it carry `feature: observation` evidence and free description;
//! * feature listings, one `- name: value (NN%)` line per feature.
//!
//! Neither parser panics or propagates an error to the analysis pipeline.

use regex::Regex;
use sizhen_common::{Evidence, Feature, FeatureCategory, Result, SizhenError, SyndromeCandidate};
use std::sync::LazyLock;
use tracing::warn;

/// Confidence given to a candidate or feature without a percentage.
pub const DEFAULT_LLM_CONFIDENCE: f64 = 0.8;

const SECTION_HEADINGS: [&str; 2] = ["syndrome analysis", "辨证分析"];

static TRAILING_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[(（]\s*(\d{1,3}(?:\.\d+)?)\s*[%％]\s*[)）]\s*$").unwrap()
});

/// Parse a syndrome analysis, returning an empty list on any failure.
pub fn parse_syndromes(text: &str) -> Vec<SyndromeCandidate> {
    match try_parse_syndromes(text) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "Discarding unparseable model reply");
            Vec::new()
        }
    }
}

/// Parse a syndrome analysis.
///
/// Fails with `AnalysisParse` when the reply is blank or holds no bullet.
pub fn try_parse_syndromes(text: &str) -> Result<Vec<SyndromeCandidate>> {
    if text.trim().is_empty() {
        return Err(SizhenError::AnalysisParse("empty reply".into()));
    }

    let mut candidates: Vec<SyndromeCandidate> = Vec::new();
    let mut current: Option<SyndromeCandidate> = None;

    for raw in analysis_section(text) {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match strip_bullet(line) {
            Some(body) => {
                candidates.extend(current.take());
                current = open_candidate(body);
            }
            None => {
                // Lines before the first bullet carry no candidate.
                let Some(candidate) = current.as_mut() else {
                    continue;
                };
                add_detail(candidate, line);
            }
        }
    }
    candidates.extend(current);

    if candidates.is_empty() {
        return Err(SizhenError::AnalysisParse(
            "reply contains no syndrome bullet".into(),
        ));
    }
    Ok(candidates)
}

/// Parse `name: value (NN%)` lines into features of the given category.
///
/// Names and values are normalized to lowercase snake_case. Lines that
/// are not key/value pairs are skipped.
pub fn parse_feature_lines(text: &str, category: FeatureCategory) -> Vec<Feature> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let body = strip_bullet(line).unwrap_or(line);
            let (body, confidence) = split_percent(body);
            let (name, value) = split_key_value(body)?;
            let (name, value) = (normalize_token(name), normalize_token(value));
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(Feature::new(name, value, confidence, category))
        })
        .collect()
}

fn analysis_section(text: &str) -> Vec<&str> {
    let mut lines = text.lines();
    let has_heading = |line: &str| {
        line.trim()
            .strip_prefix("##")
            .filter(|rest| !rest.starts_with('#'))
            .map(|rest| {
                let heading = rest.trim().to_lowercase();
                SECTION_HEADINGS.contains(&heading.as_str())
            })
            .unwrap_or(false)
    };

    if !text.lines().any(has_heading) {
        return text.lines().collect();
    }

    lines.by_ref().find(|line| has_heading(*line));
    lines
        .take_while(|line| !line.trim_start().starts_with("##"))
        .collect()
}

fn strip_bullet(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

fn open_candidate(body: &str) -> Option<SyndromeCandidate> {
    let (name, confidence) = split_percent(body);
    let name = name.trim_matches(|c: char| c == '*' || c.is_whitespace());
    if name.is_empty() {
        return None;
    }
    Some(SyndromeCandidate::new(format!("llm:{name}"), name, confidence))
}

fn add_detail(candidate: &mut SyndromeCandidate, line: &str) {
    if let Some((key, value)) = split_key_value(line) {
        candidate.evidences.push(Evidence::new(key, value, 1.0));
        return;
    }

    if !candidate.description.is_empty() {
        candidate.description.push(' ');
    }
    candidate.description.push_str(line);
}

fn split_percent(body: &str) -> (&str, f64) {
    match TRAILING_PERCENT.captures(body) {
        Some(caps) => {
            let confidence = caps[1]
                .parse::<f64>()
                .map(|pct| pct / 100.0)
                .unwrap_or(DEFAULT_LLM_CONFIDENCE);
            let start = caps.get(0).map(|m| m.start()).unwrap_or(body.len());
            (body[..start].trim_end(), confidence)
        }
        None => (body, DEFAULT_LLM_CONFIDENCE),
    }
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let idx = line.find([':', '：'])?;
    let key = line[..idx].trim_matches(|c: char| c == '*' || c.is_whitespace());
    let sep_len = line[idx..].chars().next().map(char::len_utf8).unwrap_or(1);
    let value = line[idx + sep_len..].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

fn normalize_token(token: &str) -> String {
    token
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bullets_with_percent_evidence_and_description() {
        let reply = "\
Some preamble the model added.

## Syndrome Analysis
- Liver Qi Stagnation (75%)
  pulse_type: wiry
  Emotional strain blocks the free flow of qi.
  Worse under stress.
- Spleen Qi Deficiency
  fatigue: severe

## Treatment
- Ignore me (99%)
";
        let candidates = try_parse_syndromes(reply).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.id, "llm:Liver Qi Stagnation");
        assert_eq!(first.name, "Liver Qi Stagnation");
        assert!((first.confidence - 0.75).abs() < 1e-9);
        assert_eq!(first.evidences, vec![Evidence::new("pulse_type", "wiry", 1.0)]);
        assert_eq!(
            first.description,
            "Emotional strain blocks the free flow of qi. Worse under stress."
        );
        assert!(first.category.is_empty());

        assert_eq!(candidates[1].confidence, DEFAULT_LLM_CONFIDENCE);
    }

    #[test]
    fn chinese_heading_full_width_punctuation() {
        let reply = "## 辨证分析\n* 肝郁气滞（82％）\n  脉象：弦\n## 调理建议\n- 无关";
        let candidates = try_parse_syndromes(reply).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "肝郁气滞");
        assert!((candidates[0].confidence - 0.82).abs() < 1e-9);
        assert_eq!(candidates[0].evidences[0].feature_name, "脉象");
        assert_eq!(candidates[0].evidences[0].feature_value, "弦");
    }

    #[test]
    fn whole_reply_is_used_without_heading() {
        let candidates = parse_syndromes("- Damp Heat (60%)\n- **Blood Stasis** (40%)");
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Damp Heat", "Blood Stasis"]);
    }

    #[test]
    fn indented_bullets_open_candidates() {
        let reply = "\
- Liver Qi Stagnation (70%)
  - Spleen Deficiency (60%)
    fatigue: severe
    Weak transformation of food.";
        let candidates = try_parse_syndromes(reply).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Liver Qi Stagnation", "Spleen Deficiency"]);
        assert!((candidates[1].confidence - 0.6).abs() < 1e-9);
        assert!(candidates[0].evidences.is_empty());
        assert_eq!(candidates[1].evidences[0].feature_name, "fatigue");
        assert_eq!(candidates[1].description, "Weak transformation of food.");
    }

    #[test]
    fn empty_or_bulletless_reply_is_parse_error() {
        assert!(matches!(
            try_parse_syndromes("   "),
            Err(SizhenError::AnalysisParse(_))
        ));
        assert!(matches!(
            try_parse_syndromes("I cannot determine a syndrome."),
            Err(SizhenError::AnalysisParse(_))
        ));
        assert!(parse_syndromes("no bullets here").is_empty());
    }

    #[test]
    fn percent_is_clamped() {
        let candidates = parse_syndromes("- Overconfident (250%)");
        assert_eq!(candidates[0].confidence, 1.0);
    }

    #[test]
    fn feature_lines_are_normalized() {
        let text = "\
# Features
- Tongue Color: Pale (90%)
- tongue_shape: teeth-marked
- not a feature line
- : orphan value
";
        let features = parse_feature_lines(text, FeatureCategory::Tongue);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "tongue_color");
        assert_eq!(features[0].value, "pale");
        assert!((features[0].confidence - 0.9).abs() < 1e-9);
        assert_eq!(features[1].value, "teeth_marked");
        assert_eq!(features[1].confidence, DEFAULT_LLM_CONFIDENCE);
        assert_eq!(features[1].category, FeatureCategory::Tongue);
    }
}
