//! LLM provider implementations.

pub mod fake;
pub mod ollama;

pub use fake::FakeClient;
pub use ollama::OllamaClient;
