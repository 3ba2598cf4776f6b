//! Few-shot example storage and retrieval.
//!
//! Example records are embedded into a [`VectorIndex`]; an
//! [`ExampleSelector`] wraps the index with one of three selection policies
//! and a fixed example budget.

pub mod embeddings;
pub mod selector;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use selector::{
    create_policy, ExampleSelector, SelectionPolicy, SelectorAlgorithm, SelectorConfig,
    DEFAULT_K, DEFAULT_SEED,
};
pub use types::{ExampleRecord, MetadataFilter, ScoredExample, Supervision};
pub use vector_index::{Metric, VectorIndex};
