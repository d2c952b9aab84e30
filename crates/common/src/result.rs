//! The assembled outcome of one coordination request.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SizhenError};
use crate::feature::{now_secs, DiagnosisResult};
use crate::syndrome::{ConstitutionScore, Recommendation, SyndromeCandidate};

/// Summary used when no modality was selected for dispatch.
pub const NO_SERVICES_SUMMARY: &str = "No diagnostic services were executed.";

/// Terminal state of a coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationResult {
    /// Assigned once at dispatch time
    pub coordination_id: String,

    pub user_id: String,

    /// Passed through from the request, never interpreted
    pub session_id: String,

    pub status: CoordinationStatus,

    pub diagnosis_results: Vec<DiagnosisResult>,

    /// Sorted by descending confidence
    pub syndromes: Vec<SyndromeCandidate>,

    /// Mean confidence of `syndromes`, 0.0 when empty
    pub analysis_confidence: f64,

    pub constitution_scores: Vec<ConstitutionScore>,

    pub recommendations: Vec<Recommendation>,

    pub summary: String,

    /// Unix seconds
    pub timestamp: u64,
}

impl CoordinationResult {
    fn bare(
        coordination_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        status: CoordinationStatus,
        summary: String,
    ) -> Self {
        Self {
            coordination_id: coordination_id.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            status,
            diagnosis_results: Vec::new(),
            syndromes: Vec::new(),
            analysis_confidence: 0.0,
            constitution_scores: Vec::new(),
            recommendations: Vec::new(),
            summary,
            timestamp: now_secs(),
        }
    }

    /// Result for a request in which no modality was selected.
    pub fn no_services(
        coordination_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::bare(
            coordination_id,
            user_id,
            session_id,
            CoordinationStatus::Completed,
            NO_SERVICES_SUMMARY.to_string(),
        )
    }

    /// Degraded result for a coordinator-internal failure.
    pub fn failed(
        coordination_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        error: &SizhenError,
    ) -> Self {
        Self::bare(
            coordination_id,
            user_id,
            session_id,
            CoordinationStatus::Failed,
            format!("Four-diagnosis coordination failed: {error}"),
        )
    }

    pub fn primary_syndrome(&self) -> Option<&SyndromeCandidate> {
        self.syndromes.first()
    }

    pub fn primary_constitution(&self) -> Option<&ConstitutionScore> {
        self.constitution_scores.iter().find(|c| c.is_primary)
    }

    /// Check the invariants every returned result must hold.
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);

        if self.coordination_id.is_empty() {
            return Err(SizhenError::Internal("coordination id is empty".into()));
        }

        for result in &self.diagnosis_results {
            if !in_range(result.confidence) {
                return Err(SizhenError::Internal(format!(
                    "{} result confidence {} out of range",
                    result.diagnosis_type, result.confidence
                )));
            }
            if let Some(feature) = result.features.iter().find(|f| !in_range(f.confidence)) {
                return Err(SizhenError::Internal(format!(
                    "feature '{}' confidence {} out of range",
                    feature.name, feature.confidence
                )));
            }
        }

        if let Some(s) = self.syndromes.iter().find(|s| !in_range(s.confidence)) {
            return Err(SizhenError::Internal(format!(
                "syndrome '{}' confidence {} out of range",
                s.name, s.confidence
            )));
        }

        if self
            .syndromes
            .windows(2)
            .any(|pair| pair[0].confidence < pair[1].confidence)
        {
            return Err(SizhenError::Internal(
                "syndromes are not sorted by descending confidence".into(),
            ));
        }

        if !in_range(self.analysis_confidence) {
            return Err(SizhenError::Internal(format!(
                "analysis confidence {} out of range",
                self.analysis_confidence
            )));
        }

        let primaries = self
            .constitution_scores
            .iter()
            .filter(|c| c.is_primary)
            .count();
        if !self.constitution_scores.is_empty() && primaries != 1 {
            return Err(SizhenError::Internal(format!(
                "expected exactly one primary constitution, found {primaries}"
            )));
        }

        Ok(())
    }
}
