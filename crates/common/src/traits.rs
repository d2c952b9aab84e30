//! Collaborator seams consumed by the coordination core.
//!
//! These traits live in `sizhen-common` so the coordinator, the analysis
//! crate and any transport implementation can depend on them without
//! depending on each other.

use crate::feature::DiagnosisType;
use crate::request::ModalityPayload;
use crate::result::CoordinationResult;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request sent to one remote diagnostic service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub user_id: String,
    pub session_id: String,
    pub payload: ModalityPayload,
    /// Modality-specific switches (image type, sample rate, ...)
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// A measurement exactly as the remote service reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub confidence: f64,
    /// Free-form category label; normalized by the adapter
    #[serde(default)]
    pub category: String,
}

impl RawFeature {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            confidence,
            category: category.into(),
        }
    }
}

/// Heterogeneous response of a remote diagnostic service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_id: Option<String>,
    #[serde(default)]
    pub features: Vec<RawFeature>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub detailed_result: String,
    /// Unix seconds, if the service stamps its results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Client for one remote diagnostic service (look, listen, inquiry, palpation).
#[async_trait]
pub trait DiagnosticService: Send + Sync {
    /// The modality this service analyses.
    fn modality(&self) -> DiagnosisType;

    /// Identifier reported as `source_service` on results.
    fn service_id(&self) -> &str {
        self.modality().service_id()
    }

    /// Analyse one payload. Transport and wire format are up to the implementation.
    async fn analyze(&self, request: ServiceRequest) -> Result<ServiceResponse>;
}

/// Persistence for assembled coordination results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn save(&self, result: &CoordinationResult) -> Result<()>;

    /// Returns `SizhenError::NotFound` when no result has the given id.
    async fn get_by_coordination_id(&self, coordination_id: &str) -> Result<CoordinationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_response_tolerates_sparse_json() {
        let response: ServiceResponse = serde_json::from_str(
            r#"{"features":[{"name":"tongue_color","value":"red"}],"confidence":0.8}"#,
        )
        .unwrap();
        assert!(response.diagnosis_id.is_none());
        assert_eq!(response.features[0].category, "");
        assert_eq!(response.features[0].confidence, 0.0);
        assert!(response.detailed_result.is_empty());
    }
}
