//! Trigram embedding provider using character trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use meteo_core::AppResult;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    // en
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", // es
    "el", "la", "los", "las", "un", "una", "de", "del", "y", "o", "en", "con", "por", "para",
    "es", "al", "lo", "se",
];

static STOP_WORD_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn stop_words() -> &'static HashSet<&'static str> {
    STOP_WORD_SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings based on text content using
/// character trigrams and word frequencies. While not semantically
/// accurate like neural embedding models, it produces consistent,
/// content-dependent vectors suitable for development, tests and offline use.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    model: String,
}

impl TrigramProvider {
    pub const DEFAULT_MODEL: &'static str = "trigram-v1";

    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    /// Tag embeddings with a model name, so indexes built under different
    /// names are told apart when they are loaded.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Generate a trigram-based embedding for text.
    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        let lower = text.to_lowercase();

        // Ordered map keeps float accumulation order stable across runs
        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !stop_words().contains(w) && w.chars().count() > 2)
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let trigram_hash = trigram
                    .bytes()
                    .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));

                let dim_idx = (trigram_hash as usize) % self.dimensions;
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            // Also encode whole word
            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let base_dim = (word_hash as usize) % self.dimensions;
            embedding[base_dim] += *freq as f32;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_trigram_provider_dimensions() {
        let provider = TrigramProvider::new(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[test]
    fn test_trigram_provider_custom_model() {
        let provider = TrigramProvider::new(64).with_model("trigram-es");
        assert_eq!(provider.model_name(), "trigram-es");
        assert_eq!(
            provider.embed("reseñas").unwrap(),
            TrigramProvider::new(64).embed("reseñas").unwrap()
        );
    }

    #[test]
    fn test_trigram_provider_embed_single() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("hello world").unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_trigram_provider_embed_batch() {
        let provider = TrigramProvider::new(64);
        let texts = vec![
            "estoy feliz".to_string(),
            "me da igual".to_string(),
            "no me gusta".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 64);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_trigram_provider_deterministic() {
        let provider = TrigramProvider::new(384);
        let text = "deterministic test with repeated repeated words";

        let embedding1 = provider.embed(text).unwrap();
        let embedding2 = provider.embed(text).unwrap();

        assert_eq!(embedding1, embedding2);
    }

    #[test]
    fn test_trigram_provider_different_texts() {
        let provider = TrigramProvider::new(384);

        let embedding1 = provider.embed("hello world").unwrap();
        let embedding2 = provider.embed("goodbye world").unwrap();

        assert_ne!(embedding1, embedding2);
    }

    #[test]
    fn test_punctuation_is_ignored() {
        let provider = TrigramProvider::new(128);
        assert_eq!(
            provider.embed("guay!!").unwrap(),
            provider.embed("guay").unwrap()
        );
    }

    #[test]
    fn test_trigram_provider_empty_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").unwrap();

        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_trigram_provider_utf8_safety() {
        let provider = TrigramProvider::new(384);

        let text = "Pequeño análisis de reseñas 🎮 con acentos y eñes";
        let embedding = provider.embed(text).unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}
