//! Modality adapters.
//!
//! An adapter turns one modality payload into a normalized
//! [`DiagnosisResult`]: it builds the service request, calls the remote
//! diagnostic service with a per-attempt timeout and linear backoff, and
//! maps the raw response onto canonical features.

use crate::config::DispatchConfig;
use crate::metrics::CoordinationMetrics;
use async_trait::async_trait;
use sizhen_analysis::FeatureExtractor;
use sizhen_common::{
    now_secs, sanitize_confidence, DiagnosisResult, DiagnosisType, DiagnosticService, Feature,
    FeatureCategory, ImageType, ModalityPayload, Result, ServiceRequest, ServiceResponse,
    SizhenError,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs one modality of a coordination.
#[async_trait]
pub trait ModalityAdapter: Send + Sync {
    fn modality(&self) -> DiagnosisType;

    /// Analyse the payload. Errors stay scoped to this modality.
    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        payload: &ModalityPayload,
    ) -> Result<DiagnosisResult>;
}

struct Enrichment {
    extractor: Arc<dyn FeatureExtractor>,
    min_structured_features: usize,
}

/// Adapter backed by a remote [`DiagnosticService`].
pub struct ServiceAdapter {
    service: Arc<dyn DiagnosticService>,
    call_timeout: Duration,
    retry_count: u32,
    retry_base_delay: Duration,
    enrichment: Option<Enrichment>,
    metrics: Option<Arc<CoordinationMetrics>>,
}

impl ServiceAdapter {
    pub fn new(service: Arc<dyn DiagnosticService>) -> Self {
        Self::from_config(service, &DispatchConfig::default())
    }

    pub fn from_config(service: Arc<dyn DiagnosticService>, config: &DispatchConfig) -> Self {
        Self {
            service,
            call_timeout: config.call_timeout(),
            retry_count: config.retry_count.max(1),
            retry_base_delay: config.retry_base_delay(),
            enrichment: None,
            metrics: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// `attempts` is the total number of calls, at least one.
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_count = attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    /// Extract extra features from the detailed report when the service
    /// returns fewer than `min_structured_features`. Only used for looking.
    pub fn with_enrichment(
        mut self,
        extractor: Arc<dyn FeatureExtractor>,
        min_structured_features: usize,
    ) -> Self {
        self.enrichment = Some(Enrichment {
            extractor,
            min_structured_features,
        });
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CoordinationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn build_request(
        &self,
        user_id: &str,
        session_id: &str,
        payload: &ModalityPayload,
    ) -> Result<ServiceRequest> {
        let modality = self.service.modality();
        if payload.diagnosis_type() != modality {
            return Err(SizhenError::ModalityUnavailable {
                modality,
                reason: format!("received a {} payload", payload.diagnosis_type()),
            });
        }
        if payload.is_empty() {
            return Err(SizhenError::ModalityUnavailable {
                modality,
                reason: "payload is empty".into(),
            });
        }

        Ok(ServiceRequest {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            payload: payload.clone(),
            options: request_options(payload),
        })
    }

    async fn call_with_retry(&self, request: &ServiceRequest) -> Result<(ServiceResponse, u32)> {
        let modality = self.service.modality();
        let mut last_error = String::new();

        for attempt in 1..=self.retry_count {
            let outcome =
                tokio::time::timeout(self.call_timeout, self.service.analyze(request.clone())).await;

            match outcome {
                Ok(Ok(response)) => return Ok((response, attempt)),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("call timed out after {}ms", self.call_timeout.as_millis())
                }
            }

            if attempt < self.retry_count {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                warn!(
                    modality = %modality,
                    attempt = attempt,
                    max_attempts = self.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Retrying diagnostic service call"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(SizhenError::TransientAdapter {
            modality,
            attempts: self.retry_count,
            message: last_error,
        })
    }

    fn normalize(&self, response: ServiceResponse, payload: &ModalityPayload) -> DiagnosisResult {
        let modality = self.service.modality();
        let fallback = fallback_category(payload);

        let features: Vec<Feature> = response
            .features
            .into_iter()
            .filter(|raw| !raw.name.trim().is_empty())
            .map(|raw| {
                let category = FeatureCategory::parse(&raw.category).unwrap_or(fallback);
                Feature::new(raw.name.trim(), raw.value, raw.confidence, category)
            })
            .collect();

        DiagnosisResult {
            diagnosis_id: response
                .diagnosis_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            diagnosis_type: modality,
            source_service: self.service.service_id().to_string(),
            confidence: sanitize_confidence(response.confidence),
            features,
            detailed_result: response.detailed_result,
            timestamp: response.timestamp.unwrap_or_else(now_secs),
        }
    }

    /// Add model-extracted features whose names are not already present.
    async fn enrich(&self, result: &mut DiagnosisResult, payload: &ModalityPayload) {
        let Some(enrichment) = &self.enrichment else {
            return;
        };
        if result.diagnosis_type != DiagnosisType::Looking
            || result.features.len() >= enrichment.min_structured_features
            || result.detailed_result.trim().is_empty()
        {
            return;
        }

        let extracted = match enrichment
            .extractor
            .extract_features(&result.detailed_result, fallback_category(payload))
            .await
        {
            Ok(features) => features,
            Err(e) => {
                warn!(
                    diagnosis_id = %result.diagnosis_id,
                    error = %e,
                    "Feature enrichment failed; keeping structured features"
                );
                return;
            }
        };

        let mut seen: HashSet<String> = result.features.iter().map(|f| f.name.clone()).collect();
        let before = result.features.len();
        for feature in extracted {
            if seen.insert(feature.name.clone()) {
                result.features.push(feature);
            }
        }

        debug!(
            diagnosis_id = %result.diagnosis_id,
            structured = before,
            added = result.features.len() - before,
            "Enriched looking features from detailed report"
        );
    }
}

#[async_trait]
impl ModalityAdapter for ServiceAdapter {
    fn modality(&self) -> DiagnosisType {
        self.service.modality()
    }

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        payload: &ModalityPayload,
    ) -> Result<DiagnosisResult> {
        let modality = self.service.modality();
        let request = self.build_request(user_id, session_id, payload)?;
        let started = Instant::now();

        let outcome = self.call_with_retry(&request).await;
        if let Some(metrics) = &self.metrics {
            let attempts = match &outcome {
                Ok((_, attempts)) => *attempts,
                Err(_) => self.retry_count,
            };
            metrics.record_adapter(modality, outcome.is_ok(), attempts, started.elapsed());
        }

        let (response, attempts) = outcome?;
        let mut result = self.normalize(response, payload);
        self.enrich(&mut result, payload).await;

        info!(
            modality = %modality,
            diagnosis_id = %result.diagnosis_id,
            attempts = attempts,
            features = result.features.len(),
            confidence = result.confidence,
            "Modality diagnosis completed"
        );
        Ok(result)
    }
}

/// Modality-specific switches sent along with the payload.
pub fn request_options(payload: &ModalityPayload) -> BTreeMap<String, String> {
    let pairs: Vec<(&str, String)> = match payload {
        ModalityPayload::Look(p) => vec![
            ("image_type", p.image_type.as_str().to_string()),
            ("image_format", p.image_format.clone()),
            ("apply_preprocessing", "true".into()),
            ("include_visualization", "true".into()),
        ],
        ModalityPayload::Listen(p) => vec![
            ("audio_format", p.audio_format.clone()),
            ("sample_rate", p.sample_rate.to_string()),
            ("bit_depth", p.bit_depth.to_string()),
            ("channels", p.channels.to_string()),
            ("detect_dialect", "true".into()),
        ],
        ModalityPayload::Inquiry(_) => vec![
            ("max_response_tokens", "1024".into()),
            ("include_analysis", "true".into()),
        ],
        ModalityPayload::Palpation(p) => vec![
            ("data_format", p.data_format.clone()),
            ("sampling_rate", p.sampling_rate.to_string()),
            ("include_detailed_analysis", "true".into()),
        ],
    };

    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn fallback_category(payload: &ModalityPayload) -> FeatureCategory {
    match payload {
        ModalityPayload::Look(p) if p.image_type == ImageType::Face => FeatureCategory::Face,
        other => other.diagnosis_type().default_category(),
    }
}

/// Linear backoff before retry `attempt + 1`, saturating on huge bases.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}
