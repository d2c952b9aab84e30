//! Language-model client contract used by the hybrid syndrome analyzer.

pub mod client;

pub use client::{LlmClient, LlmRequest, LlmResponse};
