//! Fixture replay: diagnostic services that answer from canned JSON.
//!
//! A fixture file describes one consultation: the user and session ids
//! plus, per modality, the payload to send and the response (or failure)
//! the service should replay.
//!
//! ```json
//! {
//!   "user_id": "u-1",
//!   "session_id": "s-1",
//!   "palpation": {
//!     "payload": { "pulse_data": [1, 2, 3] },
//!     "response": { "features": [{ "name": "pulse_type", "value": "wiry", "confidence": 0.9 }], "confidence": 0.9 }
//!   }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sizhen_common::{
    CoordinationRequest, DiagnosisType, DiagnosticService, InquiryPayload, ListenPayload,
    LookPayload, PalpationPayload, Result, ServiceRequest, ServiceResponse, SizhenError,
};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a fixture service does when called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureScript {
    #[serde(default)]
    pub response: ServiceResponse,

    /// Error message to fail with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Fail only the first N calls; every call fails when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_times: Option<u32>,

    #[serde(default)]
    pub delay_ms: u64,
}

pub struct FixtureService {
    modality: DiagnosisType,
    script: FixtureScript,
    calls: AtomicU32,
}

impl FixtureService {
    pub fn new(modality: DiagnosisType, script: FixtureScript) -> Self {
        Self {
            modality,
            script,
            calls: AtomicU32::new(0),
        }
    }

    pub fn replying(modality: DiagnosisType, response: ServiceResponse) -> Self {
        Self::new(
            modality,
            FixtureScript {
                response,
                ..Default::default()
            },
        )
    }

    pub fn failing(modality: DiagnosisType, message: impl Into<String>) -> Self {
        Self::new(
            modality,
            FixtureScript {
                failure: Some(message.into()),
                ..Default::default()
            },
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosticService for FixtureService {
    fn modality(&self) -> DiagnosisType {
        self.modality
    }

    async fn analyze(&self, _request: ServiceRequest) -> Result<ServiceResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.delay_ms)).await;
        }

        if let Some(message) = &self.script.failure {
            if self.script.fail_times.map_or(true, |n| call < n) {
                return Err(SizhenError::Service(message.clone()));
            }
        }
        Ok(self.script.response.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityFixture<P> {
    pub payload: P,
    #[serde(flatten)]
    pub script: FixtureScript,
}

/// One consultation replayed from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub user_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking: Option<ModalityFixture<LookPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<ModalityFixture<ListenPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inquiry: Option<ModalityFixture<InquiryPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palpation: Option<ModalityFixture<PalpationPayload>>,
}

impl Fixture {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// The request including every modality the fixture describes.
    pub fn request(&self) -> CoordinationRequest {
        let mut request = CoordinationRequest::new(&self.user_id, &self.session_id);
        if let Some(m) = &self.looking {
            request = request.with_looking(m.payload.clone());
        }
        if let Some(m) = &self.listening {
            request = request.with_listening(m.payload.clone());
        }
        if let Some(m) = &self.inquiry {
            request = request.with_inquiry(m.payload.clone());
        }
        if let Some(m) = &self.palpation {
            request = request.with_palpation(m.payload.clone());
        }
        request
    }

    /// One replaying service per described modality.
    pub fn services(&self) -> Vec<Arc<dyn DiagnosticService>> {
        let scripts = [
            (DiagnosisType::Looking, self.looking.as_ref().map(|m| &m.script)),
            (DiagnosisType::Listening, self.listening.as_ref().map(|m| &m.script)),
            (DiagnosisType::Inquiry, self.inquiry.as_ref().map(|m| &m.script)),
            (DiagnosisType::Palpation, self.palpation.as_ref().map(|m| &m.script)),
        ];

        scripts
            .into_iter()
            .filter_map(|(modality, script)| {
                script.map(|s| {
                    Arc::new(FixtureService::new(modality, s.clone())) as Arc<dyn DiagnosticService>
                })
            })
            .collect()
    }
}
