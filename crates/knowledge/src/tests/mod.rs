//! Shared test fixtures and cross-module selection scenarios.


use crate::embeddings::EmbeddingProvider;
use meteo_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedding provider with a fixed vector per text.
#[derive(Debug, Default)]
pub(crate) struct TableProvider {
    dimensions: usize,
    table: BTreeMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableProvider {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub(crate) fn with<const N: usize>(mut self, text: &str, vector: [f32; N]) -> Self {
        self.table.insert(text.to_string(), vector.to_vec());
        self
    }

    /// Number of texts embedded so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl EmbeddingProvider for TableProvider {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::Relaxed);
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| AppError::Other(format!("No table vector for {:?}", text)))
            })
            .collect()
    }
}
