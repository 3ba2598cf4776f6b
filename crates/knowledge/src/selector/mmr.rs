//! Maximal marginal relevance selection.
//!
//! Over-fetches a candidate pool by similarity, then greedily picks the
//! candidate maximising `λ·sim(query, c) − (1−λ)·max sim(c, selected)`.

use super::{SelectionPolicy, SelectorAlgorithm};
use crate::embeddings::EmbeddingProvider;
use crate::types::ExampleRecord;
use crate::vector_index::VectorIndex;
use meteo_core::{AppError, AppResult};

/// Relevance/diversity mix. 1.0 is pure relevance.
pub const MMR_LAMBDA: f32 = 0.5;

/// Smallest candidate pool fetched before re-ranking.
pub const MIN_FETCH_K: usize = 20;

#[derive(Debug, Clone)]
pub struct MmrPolicy {
    k: usize,
    fetch_k: usize,
    lambda: f32,
}

impl MmrPolicy {
    /// `fetch_k` defaults to `max(4k, 20)`.
    pub fn new(k: usize, fetch_k: Option<usize>) -> Self {
        let fetch_k = fetch_k.unwrap_or_else(|| (4 * k).max(MIN_FETCH_K)).max(k);
        Self {
            k,
            fetch_k,
            lambda: MMR_LAMBDA,
        }
    }

    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    /// Re-rank `candidates` (positions into `index`, best first).
    fn rerank(
        &self,
        index: &VectorIndex,
        candidates: &[(usize, f32)],
    ) -> AppResult<Vec<usize>> {
        let metric = index.metric();
        let vector = |position: usize| {
            index.vector(position).ok_or_else(|| {
                AppError::Other(format!("Index has no vector at position {}", position))
            })
        };

        let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
        let mut selected: Vec<usize> = Vec::with_capacity(self.k);

        while selected.len() < self.k && !remaining.is_empty() {
            let mut best: Option<(usize, f32)> = None;

            for (slot, (position, relevance)) in remaining.iter().enumerate() {
                let candidate = vector(*position)?;
                let mut redundancy = f32::NEG_INFINITY;
                for chosen in &selected {
                    redundancy = redundancy.max(metric.similarity(candidate, vector(*chosen)?));
                }
                if selected.is_empty() {
                    redundancy = 0.0;
                }

                let score = self.lambda * relevance - (1.0 - self.lambda) * redundancy;
                // Strict comparison keeps the earlier (more relevant) candidate on ties
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((slot, score));
                }
            }

            match best {
                Some((slot, _)) => selected.push(remaining.remove(slot).0),
                None => break,
            }
        }

        Ok(selected)
    }
}

impl SelectionPolicy for MmrPolicy {
    fn algorithm(&self) -> SelectorAlgorithm {
        SelectorAlgorithm::Mmr
    }

    fn select(
        &self,
        index: &VectorIndex,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> AppResult<Vec<ExampleRecord>> {
        let query_vector = provider.embed(query)?;
        let candidates = index.rank(&query_vector, self.fetch_k, None)?;

        tracing::debug!(
            candidates = candidates.len(),
            fetch_k = self.fetch_k,
            "MMR candidate pool"
        );

        self.rerank(index, &candidates)?
            .into_iter()
            .map(|position| {
                index.record(position).cloned().ok_or_else(|| {
                    AppError::Other(format!("Index has no record at position {}", position))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TableProvider;
    use crate::vector_index::Metric;

    fn provider() -> TableProvider {
        TableProvider::new(2)
            .with("query", [1.0, 0.0])
            .with("near", [0.99, 0.14])
            .with("near twin", [0.99, 0.14])
            .with("other side", [0.6, -0.8])
    }

    fn index(provider: &TableProvider) -> VectorIndex {
        let records = ["near", "near twin", "other side"]
            .into_iter()
            .map(ExampleRecord::new)
            .collect();
        VectorIndex::build(records, provider, None, Metric::Cosine).unwrap()
    }

    #[test]
    fn test_default_fetch_k() {
        assert_eq!(MmrPolicy::new(3, None).fetch_k(), 20);
        assert_eq!(MmrPolicy::new(8, None).fetch_k(), 32);
        assert_eq!(MmrPolicy::new(5, Some(2)).fetch_k(), 5);
    }

    #[test]
    fn test_mmr_prefers_diverse_second_pick() {
        let provider = provider();
        let index = index(&provider);

        let selected = MmrPolicy::new(2, None)
            .select(&index, &provider, "query")
            .unwrap();
        let inputs: Vec<&str> = selected.iter().map(|r| r.input.as_str()).collect();

        // Pure similarity would return the near-duplicate pair
        assert_eq!(inputs, vec!["near", "other side"]);
    }

    #[test]
    fn test_mmr_never_exceeds_population() {
        let provider = provider();
        let index = index(&provider);

        let selected = MmrPolicy::new(10, None)
            .select(&index, &provider, "query")
            .unwrap();
        assert_eq!(selected.len(), 3);
    }
}
