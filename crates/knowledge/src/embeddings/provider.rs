//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{OllamaProvider, TrigramProvider};
use meteo_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Every vector returned by one provider has exactly `dimensions()` entries.
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()])?;
        results
            .pop()
            .ok_or_else(|| AppError::Other("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// # Errors
/// Returns `AppError::Configuration` for an unknown provider or zero dimensions.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Configuration(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }

    match config.provider.as_str() {
        "trigram" => {
            if config.model.trim().is_empty() {
                return Err(AppError::Configuration(
                    "Trigram provider needs a model name".to_string(),
                ));
            }
            Ok(Arc::new(
                TrigramProvider::new(config.dimensions).with_model(config.model.as_str()),
            ))
        }

        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),

        _ => Err(AppError::Configuration(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let config = EmbeddingConfig::new("trigram", "trigram-v1", 384);

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_trigram_model_comes_from_config() {
        let config = EmbeddingConfig::new("trigram", "trigram-es", 64);
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "trigram-es");

        let config = EmbeddingConfig::new("trigram", " ", 64);
        assert!(matches!(
            create_provider(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_mock_is_not_a_provider() {
        let config = EmbeddingConfig::new("mock", "trigram-v1", 64);
        assert!(matches!(
            create_provider(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig::new("unknown", "test", 384);

        let result = create_provider(&config);
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig::new("trigram", "trigram-v1", 0);
        assert!(matches!(
            create_provider(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();

        let embedding = provider.embed("test text").unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
