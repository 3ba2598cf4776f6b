//! LLM provider factory.
//!
//! This module resolves a provider name from configuration into a concrete
//! client. Unknown names fail before any request is made.

use crate::client::LlmClient;
use crate::providers::{FakeClient, OllamaClient};
use crate::types::{FakeModel, ProviderType};
use meteo_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "fake-llm")
/// * `model` - Model identifier; selects the behaviour of `fake-llm`
/// * `endpoint` - Optional custom endpoint URL
///
/// # Errors
/// Returns `AppError::Configuration` if the provider or fake model is unknown.
pub fn create_client(
    provider: &str,
    model: &str,
    endpoint: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Configuration(format!(
            "Unknown provider: {}. Supported: ollama, fake-llm",
            provider
        ))
    })?;

    tracing::debug!(provider = provider_type.as_str(), model, "Creating LLM client");

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::new(endpoint))),
        ProviderType::FakeLlm => Ok(Arc::new(FakeClient::new(FakeModel::parse(model)?))),
    }
}
