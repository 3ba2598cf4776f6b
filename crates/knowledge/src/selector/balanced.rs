//! Class-balanced similarity selection.
//!
//! The budget `k` is split across the classes in list order: each class gets
//! `⌊k/n⌋` and the first `k mod n` classes get one more. One filtered search
//! runs per class; the combined list is shuffled with a fixed seed so class
//! order does not leak into the prompt.

use super::{SelectionPolicy, SelectorAlgorithm};
use crate::embeddings::EmbeddingProvider;
use crate::types::{ExampleRecord, MetadataFilter};
use crate::vector_index::VectorIndex;
use meteo_core::AppResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct ClassBalancedPolicy {
    k: usize,
    classes: Vec<String>,
    class_key: String,
    seed: u64,
}

impl ClassBalancedPolicy {
    /// `classes` must be distinct and no more than `k`.
    pub fn new(k: usize, classes: Vec<String>, class_key: String, seed: u64) -> Self {
        Self {
            k,
            classes,
            class_key,
            seed,
        }
    }

    /// Per-class budget, in class order.
    pub fn quotas(&self) -> Vec<(&str, usize)> {
        let n = self.classes.len();
        if n == 0 {
            return Vec::new();
        }

        let base = self.k / n;
        let remainder = self.k % n;
        self.classes
            .iter()
            .enumerate()
            .map(|(position, class)| {
                let extra = usize::from(position < remainder);
                (class.as_str(), base + extra)
            })
            .collect()
    }
}

impl SelectionPolicy for ClassBalancedPolicy {
    fn algorithm(&self) -> SelectorAlgorithm {
        SelectorAlgorithm::SimilarityClassBalanced
    }

    fn select(
        &self,
        index: &VectorIndex,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> AppResult<Vec<ExampleRecord>> {
        let query_vector = provider.embed(query)?;
        let mut selected = Vec::with_capacity(self.k);

        for (class, quota) in self.quotas() {
            let filter = MetadataFilter::eq(self.class_key.as_str(), class);
            let hits = index.search_by_vector(&query_vector, quota, Some(&filter))?;

            if hits.len() < quota {
                tracing::debug!(
                    class,
                    quota,
                    available = hits.len(),
                    "Class has fewer examples than its quota"
                );
            }
            selected.extend(hits.into_iter().map(|hit| hit.record));
        }

        // Fresh generator per call so repeated queries agree
        let mut rng = StdRng::seed_from_u64(self.seed);
        selected.shuffle(&mut rng);

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(k: usize, classes: &[&str]) -> ClassBalancedPolicy {
        ClassBalancedPolicy::new(
            k,
            classes.iter().map(|c| c.to_string()).collect(),
            "output".to_string(),
            42,
        )
    }

    #[test]
    fn test_even_split() {
        let even = policy(6, &["a", "b", "c"]);
        let quotas = even.quotas();
        assert_eq!(quotas, vec![("a", 2), ("b", 2), ("c", 2)]);
    }

    #[test]
    fn test_remainder_goes_to_first_classes() {
        let uneven = policy(5, &["a", "b", "c"]);
        let quotas = uneven.quotas();
        assert_eq!(quotas, vec![("a", 2), ("b", 2), ("c", 1)]);

        let total: usize = policy(7, &["a", "b", "c"]).quotas().iter().map(|q| q.1).sum();
        assert_eq!(total, 7);
    }
}
