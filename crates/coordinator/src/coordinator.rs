//! The four-diagnosis coordinator.
//!
//! One call to [`FourDiagnosisCoordinator::coordinate`] selects the
//! modalities a request can run, dispatches their adapters, fuses the
//! successful results and assembles a [`CoordinationResult`]. The call
//! never returns an error: a failed modality is dropped, and an internal
//! failure produces a degraded `failed` result.

use crate::adapter::{ModalityAdapter, ServiceAdapter};
use crate::config::{CoordinatorConfig, DispatchMode};
use crate::dispatch::{run_parallel, run_sequential, AbortOnDrop, DispatchJob};
use crate::metrics::CoordinationMetrics;
use crate::repository::InMemoryResultRepository;
use sizhen_analysis::{
    summarize, synthesize, ConstitutionAssessor, HybridAnalyzer, PromptTemplate, RuleLibrary,
    RuleMatcher, SyndromeAnalyzer,
};
use sizhen_common::{
    fuse_features, now_secs, CoordinationRequest, CoordinationResult, CoordinationStatus,
    DiagnosisResult, DiagnosisType, DiagnosticService, Result, ResultRepository, SizhenError,
};
use sizhen_llm::LlmClient;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Summary used when modalities were dispatched but none returned a result.
pub const ALL_FAILED_SUMMARY: &str =
    "No diagnostic service returned a result; the four-diagnosis analysis could not be completed.";

/// Lifecycle of a single coordination.
///
/// `created → dispatching → collecting → merging → completed` on the normal
/// path. `failed` follows `dispatching` when the dispatch task itself dies,
/// and follows `merging` when the assembled result breaks its invariants.
/// An empty selection goes straight from `created` to `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationState {
    Created,
    Dispatching,
    Collecting,
    Merging,
    Completed,
    Failed,
}

impl fmt::Display for CoordinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordinationState::Created => "created",
            CoordinationState::Dispatching => "dispatching",
            CoordinationState::Collecting => "collecting",
            CoordinationState::Merging => "merging",
            CoordinationState::Completed => "completed",
            CoordinationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Lifecycle<'a> {
    coordination_id: &'a str,
    state: CoordinationState,
}

impl<'a> Lifecycle<'a> {
    fn new(coordination_id: &'a str) -> Self {
        debug!(coordination_id, state = %CoordinationState::Created, "Coordination state");
        Self {
            coordination_id,
            state: CoordinationState::Created,
        }
    }

    fn advance(&mut self, next: CoordinationState) {
        debug!(
            coordination_id = self.coordination_id,
            from = %self.state,
            to = %next,
            "Coordination state transition"
        );
        self.state = next;
    }
}

/// A modality registration. Services are wrapped in a [`ServiceAdapter`]
/// when a coordination runs, so the adapter always sees the current
/// configuration and model client.
enum Registration {
    Service(Arc<dyn DiagnosticService>),
    Adapter(Arc<dyn ModalityAdapter>),
}

pub struct FourDiagnosisCoordinator {
    config: CoordinatorConfig,
    registrations: BTreeMap<DiagnosisType, Registration>,
    library: Arc<RuleLibrary>,
    template: PromptTemplate,
    llm: Option<Arc<dyn LlmClient>>,
    repository: Arc<dyn ResultRepository>,
    metrics: Arc<CoordinationMetrics>,
}

impl FourDiagnosisCoordinator {
    /// Create a coordinator from configuration.
    ///
    /// Loads the rule library and the prompt template once; both are
    /// read-only afterwards. Fails on invalid configuration or an
    /// unreadable rule library.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        info!(
            mode = ?config.dispatch.mode,
            rules_version = %config.analysis.rules_version,
            "Initializing four-diagnosis coordinator"
        );

        let library = RuleLibrary::load(
            &config.analysis.rules_version,
            config.analysis.rules_path.as_deref(),
        )?;

        let template = match &config.analysis.prompt_template_path {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::default(),
        };

        Ok(Self {
            config,
            registrations: BTreeMap::new(),
            library: Arc::new(library),
            template,
            llm: None,
            repository: Arc::new(InMemoryResultRepository::new()),
            metrics: Arc::new(CoordinationMetrics::default()),
        })
    }

    /// Register the remote service for its modality, replacing any earlier one.
    pub fn with_service(mut self, service: Arc<dyn DiagnosticService>) -> Self {
        let modality = service.modality();
        self.registrations
            .insert(modality, Registration::Service(service));
        self
    }

    /// Register a custom adapter for its modality, replacing any earlier one.
    pub fn with_adapter(mut self, adapter: Arc<dyn ModalityAdapter>) -> Self {
        let modality = adapter.modality();
        self.registrations
            .insert(modality, Registration::Adapter(adapter));
        self
    }

    pub fn with_llm(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn with_result_repository(mut self, repository: Arc<dyn ResultRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_rule_library(mut self, library: Arc<RuleLibrary>) -> Self {
        self.library = library;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<CoordinationMetrics> {
        self.metrics.clone()
    }

    /// Run one coordination. Always returns a result.
    pub async fn coordinate(&self, request: &CoordinationRequest) -> CoordinationResult {
        let coordination_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new(&coordination_id);

        info!(
            coordination_id = %coordination_id,
            user_id = %request.user_id,
            session_id = %request.session_id,
            "Coordination started"
        );

        let jobs = self.select(&coordination_id, request);
        if jobs.is_empty() {
            info!(coordination_id = %coordination_id, "No modality selected; nothing to dispatch");
            self.metrics.record_no_services();
            lifecycle.advance(CoordinationState::Completed);
            return CoordinationResult::no_services(
                &coordination_id,
                &request.user_id,
                &request.session_id,
            );
        }

        let modalities: Vec<DiagnosisType> = jobs.iter().map(|job| job.modality).collect();
        let mode = self.config.dispatch.mode;

        lifecycle.advance(CoordinationState::Dispatching);
        let dispatch = {
            let user_id = request.user_id.clone();
            let session_id = request.session_id.clone();
            let deadline = self.config.dispatch.parallel_deadline(jobs.len());
            tokio::spawn(async move {
                match mode {
                    DispatchMode::Sequential => run_sequential(jobs, &user_id, &session_id).await,
                    DispatchMode::Parallel => {
                        run_parallel(jobs, &user_id, &session_id, deadline).await
                    }
                }
            })
        };

        let diagnosis_results = match join_dispatch(dispatch).await {
            Ok(results) => results,
            Err(e) => {
                error!(coordination_id = %coordination_id, error = %e, "Dispatch failed");
                lifecycle.advance(CoordinationState::Failed);
                let result = CoordinationResult::failed(
                    &coordination_id,
                    &request.user_id,
                    &request.session_id,
                    &e,
                );
                return self.finish(result, mode, &modalities, started).await;
            }
        };

        lifecycle.advance(CoordinationState::Collecting);
        debug!(
            coordination_id = %coordination_id,
            dispatched = modalities.len(),
            succeeded = diagnosis_results.len(),
            "Collected modality results"
        );

        lifecycle.advance(CoordinationState::Merging);
        let assembled = self
            .assemble(&coordination_id, request, diagnosis_results)
            .await;

        let result = match assembled.validate() {
            Ok(()) => {
                lifecycle.advance(CoordinationState::Completed);
                assembled
            }
            Err(e) => {
                error!(
                    coordination_id = %coordination_id,
                    error = %e,
                    "Assembled result violates invariants"
                );
                lifecycle.advance(CoordinationState::Failed);
                CoordinationResult::failed(
                    &coordination_id,
                    &request.user_id,
                    &request.session_id,
                    &e,
                )
            }
        };

        self.finish(result, mode, &modalities, started).await
    }

    /// Persist, record and log a finished coordination.
    async fn finish(
        &self,
        result: CoordinationResult,
        mode: DispatchMode,
        modalities: &[DiagnosisType],
        started: Instant,
    ) -> CoordinationResult {
        let coordination_id = &result.coordination_id;
        if let Err(e) = self.repository.save(&result).await {
            warn!(
                coordination_id = %coordination_id,
                error = %e,
                "Failed to persist coordination result"
            );
        }

        let elapsed = started.elapsed();
        self.metrics.record_coordination(
            coordination_id,
            mode,
            result.status,
            modalities,
            elapsed,
        );

        info!(
            coordination_id = %coordination_id,
            status = ?result.status,
            results = result.diagnosis_results.len(),
            syndromes = result.syndromes.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Coordination finished"
        );
        result
    }

    /// Read a stored result back.
    pub async fn result(&self, coordination_id: &str) -> Result<CoordinationResult> {
        self.repository.get_by_coordination_id(coordination_id).await
    }

    fn select(&self, coordination_id: &str, request: &CoordinationRequest) -> Vec<DispatchJob> {
        DiagnosisType::ALL
            .into_iter()
            .filter_map(|modality| match self.job_for(request, modality) {
                Ok(job) => Some(job),
                Err(e) => {
                    debug!(coordination_id, modality = %modality, reason = %e, "Modality excluded");
                    None
                }
            })
            .collect()
    }

    fn job_for(&self, request: &CoordinationRequest, modality: DiagnosisType) -> Result<DispatchJob> {
        let unavailable = |reason: &str| SizhenError::ModalityUnavailable {
            modality,
            reason: reason.to_string(),
        };

        if !request.includes(modality) {
            return Err(unavailable("not requested"));
        }
        if !self.config.modalities.is_enabled(modality) {
            return Err(unavailable("disabled by configuration"));
        }
        let payload = request
            .payload(modality)
            .filter(|payload| !payload.is_empty())
            .ok_or_else(|| unavailable("payload missing or empty"))?;
        let adapter = self
            .adapter(modality)
            .ok_or_else(|| unavailable("no adapter registered"))?;

        Ok(DispatchJob {
            modality,
            adapter,
            payload,
        })
    }

    fn adapter(&self, modality: DiagnosisType) -> Option<Arc<dyn ModalityAdapter>> {
        let adapter: Arc<dyn ModalityAdapter> = match self.registrations.get(&modality)? {
            Registration::Adapter(adapter) => adapter.clone(),
            Registration::Service(service) => Arc::new(self.service_adapter(service.clone())),
        };
        Some(adapter)
    }

    fn service_adapter(&self, service: Arc<dyn DiagnosticService>) -> ServiceAdapter {
        let looking = &self.config.modalities.looking;
        let enrich = service.modality() == DiagnosisType::Looking && looking.enrich_with_llm;

        let adapter = ServiceAdapter::from_config(service, &self.config.dispatch)
            .with_metrics(self.metrics.clone());

        match self.hybrid().filter(|_| enrich) {
            Some(hybrid) => adapter.with_enrichment(Arc::new(hybrid), looking.min_structured_features),
            None => adapter,
        }
    }

    fn hybrid(&self) -> Option<HybridAnalyzer> {
        let analysis = &self.config.analysis;
        if !analysis.llm_enabled {
            return None;
        }

        self.llm.as_ref().map(|client| {
            HybridAnalyzer::new(client.clone())
                .with_template(self.template.clone())
                .with_temperature(analysis.llm_temperature)
                .with_max_tokens(analysis.llm_max_tokens)
                .with_timeout(analysis.llm_timeout())
        })
    }

    fn analyzer(&self) -> SyndromeAnalyzer {
        let matcher = RuleMatcher::new(self.library.clone())
            .with_confidence_threshold(self.config.analysis.confidence_threshold)
            .with_policy(self.config.analysis.evidence_requirements);

        let analyzer = SyndromeAnalyzer::new(matcher);
        match self.hybrid() {
            Some(hybrid) => analyzer.with_hybrid(hybrid),
            None => analyzer,
        }
    }

    async fn assemble(
        &self,
        coordination_id: &str,
        request: &CoordinationRequest,
        diagnosis_results: Vec<DiagnosisResult>,
    ) -> CoordinationResult {
        let mut result = CoordinationResult {
            coordination_id: coordination_id.to_string(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            status: CoordinationStatus::Completed,
            diagnosis_results: Vec::new(),
            syndromes: Vec::new(),
            analysis_confidence: 0.0,
            constitution_scores: Vec::new(),
            recommendations: Vec::new(),
            summary: ALL_FAILED_SUMMARY.to_string(),
            timestamp: now_secs(),
        };

        if diagnosis_results.is_empty() {
            warn!(coordination_id, "Every dispatched modality failed");
            return result;
        }

        let contributing: Vec<DiagnosisType> = diagnosis_results
            .iter()
            .map(|r| r.diagnosis_type)
            .collect();
        let features = fuse_features(&diagnosis_results);
        debug!(
            coordination_id,
            features = features.len(),
            "Fused modality features"
        );

        let analysis = self.analyzer().analyze(&features).await;
        let constitution_scores = ConstitutionAssessor::new(self.library.clone()).assess(&features);
        let recommendations = synthesize(&analysis.syndromes, &constitution_scores, &contributing);
        let summary = summarize(
            &contributing,
            &analysis.syndromes,
            &constitution_scores,
            &recommendations,
        );

        result.diagnosis_results = diagnosis_results;
        result.syndromes = analysis.syndromes;
        result.analysis_confidence = analysis.confidence;
        result.constitution_scores = constitution_scores;
        result.recommendations = recommendations;
        result.summary = summary;
        result
    }
}

/// Wait for the dispatch task; a panic or cancellation there is internal.
/// Dropping the coordination aborts the dispatch.
async fn join_dispatch(handle: JoinHandle<Vec<DiagnosisResult>>) -> Result<Vec<DiagnosisResult>> {
    let _abort = AbortOnDrop(handle.abort_handle());
    handle
        .await
        .map_err(|e| SizhenError::Internal(format!("dispatch task did not finish: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_config() {
        let mut config = CoordinatorConfig::default();
        config.dispatch.retry_count = 0;
        assert!(matches!(
            FourDiagnosisCoordinator::new(config),
            Err(SizhenError::Config(_))
        ));
    }

    #[test]
    fn missing_rules_file_fails_startup() {
        let mut config = CoordinatorConfig::default();
        config.analysis.rules_path = Some("/nonexistent/rules.json".into());
        assert!(FourDiagnosisCoordinator::new(config).is_err());
    }

    #[tokio::test]
    async fn dispatch_task_panic_is_an_internal_error() {
        let handle = tokio::spawn(async {
            let results: Vec<DiagnosisResult> = Vec::new();
            if results.is_empty() {
                panic!("dispatch bug");
            }
            results
        });
        assert!(matches!(
            join_dispatch(handle).await,
            Err(SizhenError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn finished_dispatch_passes_results_through() {
        let handle = tokio::spawn(async { Vec::<DiagnosisResult>::new() });
        assert!(join_dispatch(handle).await.unwrap().is_empty());
    }

    #[test]
    fn state_names_are_lowercase() {
        assert_eq!(CoordinationState::Dispatching.to_string(), "dispatching");
        assert_eq!(CoordinationState::Failed.to_string(), "failed");
    }
}
