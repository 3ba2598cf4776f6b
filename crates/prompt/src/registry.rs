//! Template registry keyed by `(model, language, task)`.
//!
//! Built-in templates are compiled in under the `default` model. A template
//! directory can extend or override them; files are named
//! `<model>_<language>_<task>.yml`.

use crate::loader::{load_template, parse_template};
use crate::types::{Language, PromptTemplate};
use meteo_core::{AppError, AppResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Model name the built-in templates are registered under.
pub const DEFAULT_MODEL: &str = "default";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "default_en_classification",
        include_str!("../templates/default_en_classification.yml"),
    ),
    (
        "default_es_classification",
        include_str!("../templates/default_es_classification.yml"),
    ),
    ("default_en_qa", include_str!("../templates/default_en_qa.yml")),
    ("default_es_qa", include_str!("../templates/default_es_qa.yml")),
    (
        "default_en_code-generation",
        include_str!("../templates/default_en_code-generation.yml"),
    ),
    (
        "default_es_code-generation",
        include_str!("../templates/default_es_code-generation.yml"),
    ),
    (
        "default_en_api-generation",
        include_str!("../templates/default_en_api-generation.yml"),
    ),
    (
        "default_es_api-generation",
        include_str!("../templates/default_es_api-generation.yml"),
    ),
    (
        "default_en_api-correction",
        include_str!("../templates/default_en_api-correction.yml"),
    ),
    (
        "default_es_api-correction",
        include_str!("../templates/default_es_api-correction.yml"),
    ),
    (
        "default_en_json-info-extraction",
        include_str!("../templates/default_en_json-info-extraction.yml"),
    ),
    (
        "default_es_json-info-extraction",
        include_str!("../templates/default_es_json-info-extraction.yml"),
    ),
    (
        "default_en_summarization",
        include_str!("../templates/default_en_summarization.yml"),
    ),
    (
        "default_es_summarization",
        include_str!("../templates/default_es_summarization.yml"),
    ),
];

/// Registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TemplateKey {
    pub model: String,
    pub language: Language,
    pub task: String,
}

impl TemplateKey {
    pub fn new(model: impl Into<String>, language: Language, task: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language,
            task: task.into(),
        }
    }

    /// Parse a `<model>_<language>_<task>` file stem.
    pub fn parse_stem(stem: &str) -> AppResult<Self> {
        let parts: Vec<&str> = stem.split('_').collect();
        match parts.as_slice() {
            [model, language, task] if !model.is_empty() && !task.is_empty() => {
                let language = language.parse::<Language>().map_err(|_| {
                    AppError::Template(format!(
                        "Template name {} has unknown language {}",
                        stem, language
                    ))
                })?;
                Ok(Self::new(*model, language, *task))
            }
            _ => Err(AppError::Template(format!(
                "Template name {} must look like <model>_<language>_<task>",
                stem
            ))),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.model, self.language, self.task)
    }
}

/// Collection of validated templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<TemplateKey, Arc<PromptTemplate>>,
}

impl TemplateRegistry {
    /// Registry with no templates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the compiled-in templates.
    pub fn with_builtins() -> AppResult<Self> {
        let mut registry = Self::empty();
        for (stem, source) in BUILTIN_TEMPLATES {
            let key = TemplateKey::parse_stem(stem)?;
            let template = parse_template(source)
                .map_err(|e| AppError::Template(format!("Built-in template {}: {}", stem, e)))?;
            registry.insert(key, template);
        }
        Ok(registry)
    }

    /// Scan `dir` (non-recursive) for `*.yml` / `*.yaml` templates.
    ///
    /// Returns the number of templates registered. A missing directory
    /// registers nothing.
    pub fn load_dir(&mut self, dir: &Path) -> AppResult<usize> {
        if !dir.exists() {
            tracing::debug!("Template directory {:?} does not exist, skipping", dir);
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in walkdir::WalkDir::new(dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("yml") | Some("yaml")
            );
            if !path.is_file() || !is_yaml {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let key = TemplateKey::parse_stem(stem)?;
            let template = load_template(path)?;
            tracing::debug!("Registered template {}", key);
            self.insert(key, template);
            loaded += 1;
        }

        tracing::info!("Loaded {} templates from {:?}", loaded, dir);
        Ok(loaded)
    }

    pub fn insert(&mut self, key: TemplateKey, template: PromptTemplate) {
        self.templates.insert(key, Arc::new(template));
    }

    /// Look up a template, falling back to the `default` model.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` if neither key is registered.
    pub fn get(
        &self,
        model: &str,
        language: Language,
        task: &str,
    ) -> AppResult<Arc<PromptTemplate>> {
        let exact = TemplateKey::new(model, language, task);
        if let Some(template) = self.templates.get(&exact) {
            return Ok(Arc::clone(template));
        }

        let fallback = TemplateKey::new(DEFAULT_MODEL, language, task);
        if let Some(template) = self.templates.get(&fallback) {
            tracing::debug!("No template for {}, using {}", exact, fallback);
            return Ok(Arc::clone(template));
        }

        let available: Vec<String> = self.keys().map(ToString::to_string).collect();
        Err(AppError::Configuration(format!(
            "No template registered for {}. Available: {}",
            exact,
            available.join(", ")
        )))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TemplateKey> {
        self.templates.keys()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
