//! Prompt types for Meteo.
//!
//! This module defines the domain entities for the prompt system: the
//! section vocabulary of a template document, the language vocabulary used
//! to tag examples, and the immutable `PromptTemplate` value.

use meteo_core::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prompt language. Decides the tags used to render examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }

    /// Tag in front of an example input.
    pub fn input_tag(&self) -> &'static str {
        match self {
            Language::En => "EXAMPLE",
            Language::Es => "EJEMPLO",
        }
    }

    /// Tag in front of an example answer.
    pub fn output_tag(&self) -> &'static str {
        match self {
            Language::En => "ANSWER",
            Language::Es => "RESPUESTA",
        }
    }

    /// Tag in front of the live sample when examples carry no answers.
    pub fn question_tag(&self) -> &'static str {
        match self {
            Language::En => "QUESTION",
            Language::Es => "PREGUNTA",
        }
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            other => Err(AppError::Configuration(format!(
                "Unknown language: {}. Supported: en, es",
                other
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named section of a template document.
///
/// Each section has a top-level document key, a placeholder by which the
/// skeleton places it, and optionally one slot of its own that is filled
/// with a caller value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Domain,
    Labels,
    Detail,
    Instruction,
    ShotExamples,
    ChainOfThought,
    AnswerFormat,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Domain,
        Section::Labels,
        Section::Detail,
        Section::Instruction,
        Section::ShotExamples,
        Section::ChainOfThought,
        Section::AnswerFormat,
    ];

    /// Document key defining the section text.
    pub fn key(&self) -> &'static str {
        match self {
            Section::Domain => "PROMPT_DOMAIN",
            Section::Labels => "PROMPT_LABELS",
            Section::Detail => "PROMPT_DETAIL",
            Section::Instruction => "PROMPT_SAMPLE",
            Section::ShotExamples => "SHOT_EXAMPLES",
            Section::ChainOfThought => "CHAIN_THOUGHT",
            Section::AnswerFormat => "ANSWER_FORMAT",
        }
    }

    /// Placeholder name (without braces) used in the skeleton.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Section::Domain => "__PROMPT_DOMAIN__",
            Section::Labels => "__PROMPT_LABELS__",
            Section::Detail => "__PROMPT_DETAIL__",
            Section::Instruction => "__PROMPT_SAMPLE__",
            Section::ShotExamples => "__SHOT_EXAMPLES__",
            Section::ChainOfThought => "__CHAIN_THOUGHT__",
            Section::AnswerFormat => "__ANSWER_FORMAT__",
        }
    }

    /// The only placeholder allowed inside this section's own text.
    pub fn slot(&self) -> Option<&'static str> {
        match self {
            Section::Domain => Some("__DOMAIN__"),
            Section::Labels => Some("__LABELS__"),
            Section::Detail => Some("__DETAIL__"),
            Section::ShotExamples => Some("__EXAMPLES__"),
            Section::Instruction | Section::ChainOfThought | Section::AnswerFormat => None,
        }
    }

    pub fn from_placeholder(name: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.placeholder() == name)
    }
}

/// How few-shot examples are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExampleFormat {
    /// Input and answer, for supervised tasks
    Paired,
    /// Input only, for unsupervised tasks
    InputOnly,
}

/// One example as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shot {
    pub input: String,
    pub output: Option<String>,
}

impl Shot {
    pub fn new(input: impl Into<String>, output: Option<String>) -> Self {
        Self {
            input: input.into(),
            output,
        }
    }
}

/// Caller-supplied values for the optional sections.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub language: Language,
    pub format: ExampleFormat,
    pub domain: Option<String>,
    pub labels: Vec<String>,
    pub detail: Option<String>,
    /// Replaces the template's chain-of-thought text when set
    pub chain_of_thought: Option<String>,
    /// Replaces the template's answer-format text when set
    pub answer_format: Option<String>,
}

impl PromptContext {
    pub fn new(language: Language, format: ExampleFormat) -> Self {
        Self {
            language,
            format,
            domain: None,
            labels: Vec::new(),
            detail: None,
            chain_of_thought: None,
            answer_format: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
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

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_chain_of_thought(mut self, text: impl Into<String>) -> Self {
        self.chain_of_thought = Some(text.into());
        self
    }

    pub fn with_answer_format(mut self, text: impl Into<String>) -> Self {
        self.answer_format = Some(text.into());
        self
    }
}

/// A validated template document.
///
/// Only obtainable through `loader::parse_template`, so every value has
/// already passed placeholder validation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub(crate) skeleton: String,
    pub(crate) sections: BTreeMap<Section, String>,
    pub(crate) source: String,
}

impl PromptTemplate {
    /// Skeleton text with section placeholders.
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }

    /// Normalized text of a declared section.
    pub fn section(&self, section: Section) -> Option<&str> {
        self.sections.get(&section).map(String::as_str)
    }

    /// Declared sections and their text.
    pub fn sections(&self) -> impl Iterator<Item = (Section, &str)> {
        self.sections.iter().map(|(s, t)| (*s, t.as_str()))
    }

    /// Original YAML document the template was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_vocabulary() {
        let es: Language = "ES".parse().unwrap();
        assert_eq!(es, Language::Es);
        assert_eq!(es.input_tag(), "EJEMPLO");
        assert_eq!(es.output_tag(), "RESPUESTA");
        assert_eq!(Language::En.input_tag(), "EXAMPLE");
        assert!(matches!(
            "fr".parse::<Language>(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_section_lookup() {
        assert_eq!(
            Section::from_placeholder("__PROMPT_LABELS__"),
            Some(Section::Labels)
        );
        assert_eq!(Section::from_placeholder("__LABELS__"), None);
        assert_eq!(Section::ShotExamples.slot(), Some("__EXAMPLES__"));
        assert_eq!(Section::AnswerFormat.slot(), None);
    }

    #[test]
    fn test_context_builder() {
        let ctx = PromptContext::new(Language::En, ExampleFormat::Paired)
            .with_domain("reviews")
            .with_labels(["positive", "negative"]);
        assert_eq!(ctx.domain.as_deref(), Some("reviews"));
        assert_eq!(ctx.labels, vec!["positive", "negative"]);
        assert!(ctx.detail.is_none());
    }
}
