//! Versioned syndrome-rule and constitution library.
//!
//! The library is loaded once at startup and shared read-only for the
//! lifetime of the process.

use serde::{Deserialize, Serialize};
use sizhen_common::{Result, SizhenError};
use std::path::Path;
use tracing::{info, warn};

/// The library compiled into the crate.
pub const BUILTIN_RULES_V2: &str = include_str!("../data/differentiation_rules_v2.json");

pub const REQUIRED_DEFAULT_WEIGHT: f64 = 1.0;
pub const SUPPORTING_DEFAULT_WEIGHT: f64 = 0.5;

/// A feature name plus the values that count as a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequirement {
    pub name: String,

    #[serde(alias = "accepted_values")]
    pub values: Vec<String>,

    /// Falls back to the list's default weight when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl FeatureRequirement {
    pub fn accepts(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn weight_or(&self, default: f64) -> f64 {
        self.weight.unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyndromeRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub required_features: Vec<FeatureRequirement>,
    #[serde(default)]
    pub supporting_features: Vec<FeatureRequirement>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionIndicator {
    pub name: String,
    pub values: Vec<String>,
    pub weight: f64,
}

/// One constitution body type and the features that point to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionArchetype {
    pub type_id: String,
    pub type_name: String,
    #[serde(default)]
    pub description: String,
    pub indicators: Vec<ConstitutionIndicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLibrary {
    pub version: String,
    #[serde(default)]
    pub syndromes: Vec<SyndromeRule>,
    /// Declaration order breaks constitution score ties
    #[serde(default)]
    pub constitutions: Vec<ConstitutionArchetype>,
}

impl RuleLibrary {
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            syndromes: Vec::new(),
            constitutions: Vec::new(),
        }
    }

    /// The library shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_RULES_V2)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let library: Self = serde_json::from_str(json)?;
        library.validate()?;
        Ok(library)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content).map_err(|e| {
            SizhenError::Config(format!("Invalid rule library '{}': {}", path.display(), e))
        })
    }

    /// Load from `path` if given, otherwise the built-in library.
    ///
    /// A version mismatch is logged but the loaded library is still used.
    pub fn load(expected_version: &str, path: Option<&Path>) -> Result<Self> {
        let library = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::builtin()?,
        };

        if library.version != expected_version {
            warn!(
                expected = %expected_version,
                loaded = %library.version,
                "Rule library version differs from configured version"
            );
        }

        info!(
            version = %library.version,
            syndromes = library.syndromes.len(),
            constitutions = library.constitutions.len(),
            "Loaded differentiation rule library"
        );

        Ok(library)
    }

    pub fn validate(&self) -> Result<()> {
        let bad_weight = |w: f64| !w.is_finite() || w < 0.0;

        for rule in &self.syndromes {
            if rule.id.trim().is_empty() || rule.name.trim().is_empty() {
                return Err(SizhenError::Config(
                    "Syndrome rule with empty id or name".into(),
                ));
            }
            let requirements = rule
                .required_features
                .iter()
                .chain(rule.supporting_features.iter());
            for req in requirements {
                if req.weight.is_some_and(bad_weight) {
                    return Err(SizhenError::Config(format!(
                        "Rule '{}' feature '{}' has invalid weight {:?}",
                        rule.id, req.name, req.weight
                    )));
                }
            }
        }

        for archetype in &self.constitutions {
            if archetype.type_id.trim().is_empty() {
                return Err(SizhenError::Config("Constitution with empty type_id".into()));
            }
            if let Some(ind) = archetype.indicators.iter().find(|i| bad_weight(i.weight)) {
                return Err(SizhenError::Config(format!(
                    "Constitution '{}' indicator '{}' has invalid weight {}",
                    archetype.type_id, ind.name, ind.weight
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_library_loads() {
        let library = RuleLibrary::builtin().unwrap();
        assert_eq!(library.version, "v2");
        assert_eq!(library.syndromes.len(), 8);
        assert_eq!(library.constitutions.len(), 9);
        assert_eq!(library.constitutions[0].type_id, "balanced");
    }

    #[test]
    fn accepted_values_alias_and_default_weight() {
        let library = RuleLibrary::from_json_str(
            r#"{
                "version": "v1",
                "syndromes": [{
                    "id": "s1",
                    "name": "Test",
                    "required_features": [{"name": "pulse_type", "accepted_values": ["wiry"]}]
                }]
            }"#,
        )
        .unwrap();

        let req = &library.syndromes[0].required_features[0];
        assert!(req.accepts("wiry"));
        assert!(!req.accepts("slippery"));
        assert_eq!(req.weight_or(REQUIRED_DEFAULT_WEIGHT), 1.0);
        assert!(library.constitutions.is_empty());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let err = RuleLibrary::from_json_str(
            r#"{"version":"v2","syndromes":[{"id":"s","name":"S",
                "supporting_features":[{"name":"x","values":["y"],"weight":-1.0}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SizhenError::Config(_)));
    }

    #[test]
    fn load_from_file_overrides_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version":"v3","syndromes":[]}}"#).unwrap();

        let library = RuleLibrary::load("v2", Some(file.path())).unwrap();
        assert_eq!(library.version, "v3");
        assert!(library.syndromes.is_empty());
    }

    #[test]
    fn load_from_missing_file_fails() {
        let result = RuleLibrary::load("v2", Some(Path::new("/nonexistent/rules.json")));
        assert!(result.is_err());
    }
}
