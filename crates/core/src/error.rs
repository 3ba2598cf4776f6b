//! Error types for Meteo.
//!
//! A single enum covers every failure category. The first four variants are
//! the ones callers are expected to branch on:
//! - `Configuration`: bad construction parameters, detected before any side effect
//! - `Validation`: bad call-time input (training data, artifact paths)
//! - `Template`: malformed or inconsistent prompt template documents
//! - `Storage`: missing or corrupt persisted state

use thiserror::Error;

/// Unified error type for Meteo.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid call-time input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Prompt template errors
    #[error("Template error: {0}")]
    Template(String),

    /// Persisted index or artifact errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Short machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::Validation(_) => "validation",
            AppError::Template(_) => "template",
            AppError::Storage(_) => "storage",
            AppError::Io(_) => "io",
            AppError::Llm(_) => "llm",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
