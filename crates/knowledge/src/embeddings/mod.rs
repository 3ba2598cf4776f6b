//! Embedding providers.
//!
//! Turns example text into fixed-dimension vectors. The provider is resolved
//! once from an `EmbeddingConfig` and shared by the index and the selectors.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
