//! LLM integration crate for Meteo.
//!
//! This crate provides a provider-agnostic abstraction for sending a composed
//! prompt to a Large Language Model and receiving its answer. Calls are
//! blocking; one prompt produces one response.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **fake-llm**: Deterministic in-process models for tests and dry runs
//!
//! # Example
//! ```no_run
//! use meteo_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(None);
//! let request = LlmRequest::new("Hello, world!", "llama3");
//! let response = client.complete(&request)?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{FakeClient, OllamaClient};
pub use types::{FakeModel, ModelParams, ProviderType};
