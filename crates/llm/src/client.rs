use async_trait::async_trait;
use sizhen_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Completion text plus whatever the provider reports about the call
/// (model, token usage, finish reason, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Provider selection, health checking and retries belong to the implementation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_defaults() {
        let request = LlmRequest::new("system", "user");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 2048);

        let request = request.with_temperature(0.0).with_max_tokens(256);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 256);
    }

    #[test]
    fn response_metadata_defaults_to_empty() {
        let response: LlmResponse = serde_json::from_str(r#"{"text":"ok"}"#).unwrap();
        assert_eq!(response.text, "ok");
        assert!(response.metadata.is_empty());
    }

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            Ok(LlmResponse::text(request.user_prompt))
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn boxed_client_delegates() {
        let client: Box<dyn LlmClient> = Box::new(EchoClient);
        let response = client.complete(LlmRequest::new("s", "hello")).await.unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(client.model_name(), "echo");
    }
}
