//! Plain nearest-neighbour selection.

use super::{SelectionPolicy, SelectorAlgorithm};
use crate::embeddings::EmbeddingProvider;
use crate::types::ExampleRecord;
use crate::vector_index::VectorIndex;
use meteo_core::AppResult;

/// Returns the `k` closest records, closest first.
#[derive(Debug, Clone)]
pub struct SimilarityPolicy {
    k: usize,
}

impl SimilarityPolicy {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl SelectionPolicy for SimilarityPolicy {
    fn algorithm(&self) -> SelectorAlgorithm {
        SelectorAlgorithm::Similarity
    }

    fn select(
        &self,
        index: &VectorIndex,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> AppResult<Vec<ExampleRecord>> {
        Ok(index
            .search(query, provider, self.k, None)?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }
}
