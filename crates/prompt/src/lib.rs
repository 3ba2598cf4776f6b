//! Prompt system for Meteo.
//!
//! This crate provides structured prompt management with:
//! - YAML template documents validated at load time
//! - A template registry keyed by model, language and task
//! - The assembler that turns a template, examples and a sample into a prompt

pub mod builder;
pub mod loader;
pub mod registry;
pub mod types;

// Re-export main types
pub use builder::compose;
pub use loader::{load_template, parse_template};
pub use registry::{TemplateKey, TemplateRegistry, DEFAULT_MODEL};
pub use types::{ExampleFormat, Language, PromptContext, PromptTemplate, Section, Shot};
