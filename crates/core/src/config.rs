//! Configuration management for Meteo.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.meteo/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. The configuration is workspace-centric, with templates
//! and the config file stored in `.meteo/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// LLM providers the factory knows how to build.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["ollama", "fake-llm"];

/// Embedding providers the factory knows how to build.
pub const KNOWN_EMBEDDING_PROVIDERS: &[&str] = &["trigram", "ollama"];

/// Languages with a built-in example vocabulary.
pub const KNOWN_LANGUAGES: &[&str] = &["en", "es"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .meteo/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider (e.g., "ollama", "fake-llm")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Endpoint for HTTP providers
    pub endpoint: String,

    /// Prompt language ("en" or "es")
    pub language: String,

    /// Embedding provider settings
    pub embeddings: EmbeddingSettings,

    /// Extra template directory scanned on top of the built-ins
    pub templates_dir: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log event format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    embeddings: Option<EmbeddingSection>,
    logging: Option<LoggingSection>,
    templates: Option<TemplatesSection>,
    language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplatesSection {
    dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            language: "en".to_string(),
            embeddings: EmbeddingSettings::default(),
            templates_dir: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `METEO_WORKSPACE`: Override workspace path
    /// - `METEO_CONFIG`: Path to config file
    /// - `METEO_PROVIDER`: LLM provider
    /// - `METEO_MODEL`: Model identifier
    /// - `METEO_ENDPOINT`: Provider endpoint
    /// - `METEO_LANGUAGE`: Prompt language
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use meteo_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("METEO_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("METEO_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Configuration(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.meteo_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("METEO_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("METEO_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("METEO_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(language) = std::env::var("METEO_LANGUAGE") {
            config.language = language;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Configuration(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if let Some(endpoint) = llm.endpoint {
                result.endpoint = endpoint;
            }
        }

        if let Some(embeddings) = config_file.embeddings {
            if let Some(provider) = embeddings.provider {
                result.embeddings.provider = provider;
            }
            if let Some(model) = embeddings.model {
                result.embeddings.model = model;
            }
            if let Some(dimensions) = embeddings.dimensions {
                result.embeddings.dimensions = dimensions;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(dir) = config_file.templates.and_then(|t| t.dir) {
            let dir = PathBuf::from(dir);
            // Relative template dirs are anchored at the workspace
            result.templates_dir = Some(if dir.is_relative() {
                result.workspace.join(dir)
            } else {
                dir
            });
        }

        if let Some(language) = config_file.language {
            result.language = language;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        language: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(language) = language {
            self.language = language;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .meteo directory.
    pub fn meteo_dir(&self) -> PathBuf {
        self.workspace.join(".meteo")
    }

    /// Template directory to scan: the configured one, else `.meteo/templates`.
    pub fn template_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| self.meteo_dir().join("templates"))
    }

    /// Validate provider names and the language.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_LLM_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Configuration(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embeddings.provider.as_str()) {
            return Err(AppError::Configuration(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embeddings.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embeddings.dimensions == 0 {
            return Err(AppError::Configuration(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if !KNOWN_LANGUAGES.contains(&self.language.as_str()) {
            return Err(AppError::Configuration(format!(
                "Unknown language: {}. Supported: {}",
                self.language,
                KNOWN_LANGUAGES.join(", ")
            )));
        }

        Ok(())
    }
}
