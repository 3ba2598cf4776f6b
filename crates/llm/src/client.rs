//! The model collaborator: one composed prompt in, one answer out.

use crate::types::ModelParams;
use meteo_core::AppResult;
use serde::{Deserialize, Serialize};

/// A single completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Fully composed prompt
    pub prompt: String,

    /// Model identifier (e.g., "llama3.2", "fake-static")
    pub model: String,

    /// Sampling parameters; unset fields use the backend default
    #[serde(default)]
    pub params: ModelParams,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            params: ModelParams::default(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }
}

/// The model's answer, unparsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,

    /// Model that produced the answer, as reported by the backend
    pub model: String,

    pub usage: LlmUsage,
}

/// Token counts reported by the backend (zero when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Blocking completion backend.
///
/// A pipeline holds its client behind an `Arc`, so implementations must be
/// `Send + Sync`. Retries and timeouts are the caller's business.
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "ollama", "fake-llm").
    fn provider_name(&self) -> &str;

    fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
