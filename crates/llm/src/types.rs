//! LLM provider and model parameter types.

use meteo_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::client::LlmRequest;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    FakeLlm,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "fake-llm" | "fake" => Some(Self::FakeLlm),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::FakeLlm => "fake-llm",
        }
    }
}

/// Behaviour of the in-process fake model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeModel {
    /// Always answers the same text
    Static,
    /// Answers with the prompt it was given
    PromptCopy,
    /// Cycles through a fixed list of answers
    List,
}

impl FakeModel {
    /// Parse a fake model name such as `fake-static`.
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fake-static" => Ok(Self::Static),
            "fake-prompt-copy" => Ok(Self::PromptCopy),
            "fake-list" => Ok(Self::List),
            other => Err(AppError::Configuration(format!(
                "Unknown fake model: {}. Supported: fake-static, fake-prompt-copy, fake-list",
                other
            ))),
        }
    }

    /// Get the canonical model name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "fake-static",
            Self::PromptCopy => "fake-prompt-copy",
            Self::List => "fake-list",
        }
    }
}

/// Sampling parameters forwarded with every completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ModelParams {
    /// Build a request for `prompt` carrying these parameters.
    pub fn request(&self, prompt: impl Into<String>, model: impl Into<String>) -> LlmRequest {
        LlmRequest::new(prompt, model).with_params(self.clone())
    }
}
