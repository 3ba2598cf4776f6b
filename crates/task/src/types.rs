//! Task types and pipeline parameters.

use meteo_core::{AppError, AppResult};
use meteo_knowledge::{EmbeddingConfig, SelectorAlgorithm, SelectorConfig, Supervision};
use meteo_llm::ModelParams;
use meteo_prompt::{ExampleFormat, Language};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of task a pipeline solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Classification,
    Qa,
    CodeGeneration,
    ApiGeneration,
    ApiCorrection,
    JsonInfoExtraction,
    Summarization,
}

impl TaskType {
    pub const ALL: [TaskType; 7] = [
        TaskType::Classification,
        TaskType::Qa,
        TaskType::CodeGeneration,
        TaskType::ApiGeneration,
        TaskType::ApiCorrection,
        TaskType::JsonInfoExtraction,
        TaskType::Summarization,
    ];

    /// Name used in template file names and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Qa => "qa",
            TaskType::CodeGeneration => "code-generation",
            TaskType::ApiGeneration => "api-generation",
            TaskType::ApiCorrection => "api-correction",
            TaskType::JsonInfoExtraction => "json-info-extraction",
            TaskType::Summarization => "summarization",
        }
    }

    /// Whether training needs annotations.
    pub fn supervision(&self) -> Supervision {
        match self {
            TaskType::Classification | TaskType::CodeGeneration | TaskType::ApiGeneration => {
                Supervision::Supervised
            }
            TaskType::Qa
            | TaskType::Summarization
            | TaskType::ApiCorrection
            | TaskType::JsonInfoExtraction => Supervision::Unsupervised,
        }
    }

    /// How examples are shown in the prompt.
    pub fn example_format(&self) -> ExampleFormat {
        match self.supervision() {
            Supervision::Supervised => ExampleFormat::Paired,
            Supervision::Unsupervised => ExampleFormat::InputOnly,
        }
    }
}

impl FromStr for TaskType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let supported: Vec<&str> = TaskType::ALL.iter().map(|t| t.as_str()).collect();
                AppError::Configuration(format!(
                    "Unknown task type: {}. Supported: {}",
                    s,
                    supported.join(", ")
                ))
            })
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_model_provider() -> String {
    "ollama".to_string()
}

fn default_model_name() -> String {
    "llama3.2".to_string()
}

/// Every constructor parameter of a pipeline.
///
/// Serialized verbatim as the `.init` record of a saved model, so a loaded
/// artifact rebuilds the identical pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub task_type: TaskType,

    pub language: Language,

    #[serde(default = "default_model_provider")]
    pub model_provider: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub model_params: ModelParams,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub selector: SelectorConfig,

    /// Allowed labels; inferred at train time when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Replaces the template's answer-format text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_format: Option<String>,

    /// Replaces the template's chain-of-thought text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_of_thought: Option<String>,

    /// YAML template document used instead of the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_template: Option<String>,
}

impl PipelineParams {
    pub fn new(task_type: TaskType, language: Language) -> Self {
        Self {
            task_type,
            language,
            model_provider: default_model_provider(),
            model_name: default_model_name(),
            endpoint: None,
            model_params: ModelParams::default(),
            embedding: EmbeddingConfig::default(),
            selector: SelectorConfig::default(),
            labels: Vec::new(),
            domain: None,
            detail: None,
            answer_format: None,
            chain_of_thought: None,
            custom_template: None,
        }
    }

    pub fn with_model(mut self, provider: impl Into<String>, name: impl Into<String>) -> Self {
        self.model_provider = provider.into();
        self.model_name = name.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_selector(mut self, algorithm: SelectorAlgorithm, k: usize) -> Self {
        self.selector.algorithm = algorithm;
        self.selector.k = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.selector.seed = seed;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_answer_format(mut self, text: impl Into<String>) -> Self {
        self.answer_format = Some(text.into());
        self
    }

    pub fn with_chain_of_thought(mut self, text: impl Into<String>) -> Self {
        self.chain_of_thought = Some(text.into());
        self
    }

    pub fn with_custom_template(mut self, source: impl Into<String>) -> Self {
        self.custom_template = Some(source.into());
        self
    }

    /// Check parameters that do not need any collaborator.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` for empty model names, duplicate or
    /// blank labels, or labels on a task without annotations.
    pub fn validate(&self) -> AppResult<()> {
        if self.model_name.trim().is_empty() {
            return Err(AppError::Configuration(
                "Model name cannot be empty".to_string(),
            ));
        }

        if !self.labels.is_empty() && !self.task_type.supervision().is_supervised() {
            return Err(AppError::Configuration(format!(
                "Labels were given for {}, which trains without annotations",
                self.task_type
            )));
        }

        let mut seen = BTreeSet::new();
        for label in &self.labels {
            if label.trim().is_empty() {
                return Err(AppError::Configuration(
                    "Labels cannot be blank".to_string(),
                ));
            }
            if !seen.insert(label.as_str()) {
                return Err(AppError::Configuration(format!(
                    "Label {} is listed twice",
                    label
                )));
            }
        }

        if self.is_balanced() && self.labels.is_empty() {
            // Only classification can infer classes from annotations
            if self.task_type != TaskType::Classification {
                return Err(AppError::Configuration(format!(
                    "similarity_class_balanced needs an explicit label list for {}",
                    self.task_type
                )));
            }
            // Inferred classes are checked at train time
            if self.selector.k == 0 {
                return Err(AppError::Configuration(
                    "Selector k must be greater than 0".to_string(),
                ));
            }
            return Ok(());
        }

        self.selector_config(&self.labels).validate()
    }

    fn is_balanced(&self) -> bool {
        self.selector.algorithm == SelectorAlgorithm::SimilarityClassBalanced
    }

    /// Selector configuration for the given label set.
    ///
    /// The class-balanced selector balances across the labels.
    pub fn selector_config(&self, labels: &[String]) -> SelectorConfig {
        let mut config = self.selector.clone();
        if self.is_balanced() {
            config.class_list = labels.to_vec();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parsing() {
        assert_eq!(
            "json_info_extraction".parse::<TaskType>().unwrap(),
            TaskType::JsonInfoExtraction
        );
        assert_eq!("QA".parse::<TaskType>().unwrap(), TaskType::Qa);
        assert!(matches!(
            "translation".parse::<TaskType>(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_task_supervision() {
        assert!(TaskType::Classification.supervision().is_supervised());
        assert!(TaskType::ApiGeneration.supervision().is_supervised());
        assert!(!TaskType::Qa.supervision().is_supervised());
        assert_eq!(TaskType::Summarization.example_format(), ExampleFormat::InputOnly);
    }

    #[test]
    fn test_params_reject_duplicate_labels() {
        let params = PipelineParams::new(TaskType::Classification, Language::En)
            .with_labels(["yes", "no", "yes"]);
        assert!(matches!(params.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_params_reject_labels_on_unsupervised_task() {
        let params = PipelineParams::new(TaskType::Qa, Language::En).with_labels(["a"]);
        assert!(matches!(params.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_balanced_with_too_many_labels_fails_fast() {
        let params = PipelineParams::new(TaskType::Classification, Language::En)
            .with_selector(SelectorAlgorithm::SimilarityClassBalanced, 2)
            .with_labels(["a", "b", "c"]);
        assert!(matches!(params.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_balanced_without_labels_defers_class_check() {
        let params = PipelineParams::new(TaskType::Classification, Language::En)
            .with_selector(SelectorAlgorithm::SimilarityClassBalanced, 2);
        assert!(params.validate().is_ok());

        let params = PipelineParams::new(TaskType::Classification, Language::En)
            .with_selector(SelectorAlgorithm::SimilarityClassBalanced, 0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_balanced_without_labels_needs_classification() {
        for task_type in [TaskType::CodeGeneration, TaskType::ApiGeneration, TaskType::Qa] {
            let params = PipelineParams::new(task_type, Language::En)
                .with_selector(SelectorAlgorithm::SimilarityClassBalanced, 3);
            assert!(matches!(
                params.validate(),
                Err(AppError::Configuration(_))
            ));
        }

        let params = PipelineParams::new(TaskType::CodeGeneration, Language::En)
            .with_labels(["rust", "python"])
            .with_selector(SelectorAlgorithm::SimilarityClassBalanced, 2);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_json_round_trip() {
        let params = PipelineParams::new(TaskType::Classification, Language::Es)
            .with_model("fake-llm", "fake-static")
            .with_labels(["positivo", "negativo"])
            .with_domain("reseñas");

        let json = serde_json::to_string(&params).unwrap();
        let back: PipelineParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_params_minimal_json_uses_defaults() {
        let params: PipelineParams =
            serde_json::from_str(r#"{"task_type":"qa","language":"en"}"#).unwrap();
        assert_eq!(params.model_provider, "ollama");
        assert_eq!(params.embedding, EmbeddingConfig::default());
        assert_eq!(params.selector, SelectorConfig::default());
    }
}
