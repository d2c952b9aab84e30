//! Language-model assisted analysis.
//!
//! One model call per analysis, no retry loop of its own: retries and
//! provider fallback belong to the [`LlmClient`] implementation.

use crate::parser::{parse_feature_lines, parse_syndromes};
use crate::prompt::{
    feature_extraction_prompt, PromptBlocks, PromptTemplate, FEATURE_SYSTEM_PROMPT,
    SYNDROME_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use sizhen_common::{Feature, FeatureCategory, Result, SizhenError, SyndromeCandidate};
use sizhen_llm::{LlmClient, LlmRequest, LlmResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns a free-text report into structured features.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn extract_features(&self, report: &str, category: FeatureCategory)
        -> Result<Vec<Feature>>;
}

pub struct HybridAnalyzer {
    client: Arc<dyn LlmClient>,
    template: PromptTemplate,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl HybridAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            template: PromptTemplate::default(),
            temperature: 0.3,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the model for syndrome candidates.
    ///
    /// Any failure (model error, timeout, unparseable reply) yields an empty list.
    pub async fn analyze(&self, features: &[Feature]) -> Vec<SyndromeCandidate> {
        if features.is_empty() {
            return Vec::new();
        }

        let prompt = self.template.render(&PromptBlocks::from_features(features));
        let request = LlmRequest::new(SYNDROME_SYSTEM_PROMPT, prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match self.complete(request).await {
            Ok(response) => {
                let candidates = parse_syndromes(&response.text);
                debug!(
                    model = %self.client.model_name(),
                    candidates = candidates.len(),
                    "Model syndrome analysis parsed"
                );
                candidates
            }
            Err(e) => {
                warn!(model = %self.client.model_name(), error = %e, "Model syndrome analysis failed");
                Vec::new()
            }
        }
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| {
                SizhenError::Timeout(format!(
                    "model call exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl FeatureExtractor for HybridAnalyzer {
    async fn extract_features(
        &self,
        report: &str,
        category: FeatureCategory,
    ) -> Result<Vec<Feature>> {
        if report.trim().is_empty() {
            return Ok(Vec::new());
        }

        let request = LlmRequest::new(FEATURE_SYSTEM_PROMPT, feature_extraction_prompt(report))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let response = self.complete(request).await?;

        Ok(parse_feature_lines(&response.text, category))
    }
}
