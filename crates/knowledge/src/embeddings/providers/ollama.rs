//! Ollama Embedding Provider
//!
//! Provides semantic embeddings via Ollama's local API using models like
//! nomic-embed-text. Requests are blocking and made once; retry policy is
//! left to the caller.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use meteo_core::{AppError, AppResult};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider from configuration. Performs no network I/O.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);

            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        check_dimensions(&self.model, body.embedding, self.dimensions)
    }
}

fn check_dimensions(model: &str, embedding: Vec<f32>, expected: usize) -> AppResult<Vec<f32>> {
    if embedding.len() != expected {
        return Err(AppError::Configuration(format!(
            "Ollama model '{}' returned {} dimensions, expected {}",
            model,
            embedding.len(),
            expected
        )));
    }
    Ok(embedding)
}

impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts", texts.len());

        // Ollama has no batch endpoint; embed sequentially
        texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    Ok(vec![0.0; self.dimensions])
                } else {
                    self.embed_single(text)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig::new("ollama", "nomic-embed-text", 768)
            .with_endpoint("http://localhost:11434/")
    }

    #[test]
    fn test_provider_creation_does_no_io() {
        let provider = OllamaProvider::new(&test_config()).unwrap();
        assert_eq!(provider.dimensions(), 768);
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = OllamaProvider::new(&test_config()).unwrap();
        let embeddings = provider.embed_batch(&["  ".to_string()]).unwrap();
        assert_eq!(embeddings[0], vec![0.0; 768]);
    }

    #[test]
    fn test_dimension_mismatch_is_configuration_error() {
        let result = check_dimensions("m", vec![0.1, 0.2], 3);
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert_eq!(check_dimensions("m", vec![0.1], 1).unwrap(), vec![0.1]);
    }
}
