//! Template loader for YAML template documents.
//!
//! A document has one required key, `TEMPLATE` (the skeleton), and optional
//! section keys. Every placeholder is checked here, so a template that loads
//! can always be composed.

use crate::types::{PromptTemplate, Section};
use meteo_core::{AppError, AppResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Shape echoed back when a document cannot be parsed.
pub const EXPECTED_SHAPE: &str = "\
TEMPLATE: |
  {__PROMPT_DOMAIN__}
  {__PROMPT_LABELS__}
  {__SHOT_EXAMPLES__}
PROMPT_DOMAIN: \"The texts come from the {__DOMAIN__} domain.\"
PROMPT_LABELS: \"Classify them as one of: {__LABELS__}.\"
SHOT_EXAMPLES: \"{__EXAMPLES__}\"";

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Matches `{__NAME__}` and captures `__NAME__`.
pub(crate) fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{(__\w+__)\}").expect("PLACEHOLDER_REGEX is valid"))
}

/// Raw document as written in YAML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateDocument {
    #[serde(rename = "TEMPLATE")]
    template: String,

    #[serde(rename = "PROMPT_DOMAIN", alias = "TASK_INFO", default)]
    domain: Option<String>,

    #[serde(rename = "PROMPT_LABELS", alias = "LABELS", default)]
    labels: Option<String>,

    #[serde(rename = "PROMPT_DETAIL", default)]
    detail: Option<String>,

    #[serde(rename = "PROMPT_SAMPLE", default)]
    instruction: Option<String>,

    #[serde(rename = "SHOT_EXAMPLES", default)]
    shot_examples: Option<String>,

    #[serde(rename = "CHAIN_THOUGHT", alias = "CHAIN_OF_THOUGHTS", default)]
    chain_of_thought: Option<String>,

    #[serde(rename = "ANSWER_FORMAT", default)]
    answer_format: Option<String>,
}

impl TemplateDocument {
    fn into_sections(self) -> (String, BTreeMap<Section, String>) {
        let declared = [
            (Section::Domain, self.domain),
            (Section::Labels, self.labels),
            (Section::Detail, self.detail),
            (Section::Instruction, self.instruction),
            (Section::ShotExamples, self.shot_examples),
            (Section::ChainOfThought, self.chain_of_thought),
            (Section::AnswerFormat, self.answer_format),
        ];

        let sections = declared
            .into_iter()
            .filter_map(|(section, text)| text.map(|t| (section, normalize_text(&t))))
            .collect();

        (normalize_text(&self.template), sections)
    }
}

/// Strip indentation and trailing spaces introduced by source formatting.
fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Parse and validate a template document.
///
/// # Errors
/// Returns `AppError::Template` if the document is not a mapping with a
/// `TEMPLATE` key, has unknown keys, or references a placeholder that is
/// unknown or belongs to a section the document does not define.
pub fn parse_template(source: &str) -> AppResult<PromptTemplate> {
    let document: TemplateDocument = serde_yaml::from_str(source).map_err(|e| {
        AppError::Template(format!(
            "Malformed template document: {}. Expected shape:\n{}",
            e, EXPECTED_SHAPE
        ))
    })?;

    let (skeleton, sections) = document.into_sections();

    if skeleton.is_empty() {
        return Err(AppError::Template("TEMPLATE cannot be empty".to_string()));
    }

    let mut placed = Vec::new();
    for caps in placeholder_regex().captures_iter(&skeleton) {
        let name = &caps[1];
        let section = Section::from_placeholder(name).ok_or_else(|| {
            AppError::Template(format!("TEMPLATE references unknown section {{{}}}", name))
        })?;

        if !sections.contains_key(&section) {
            return Err(AppError::Template(format!(
                "TEMPLATE references section {{{}}} but the document does not define {}",
                name,
                section.key()
            )));
        }
        placed.push(section);
    }

    for (section, text) in &sections {
        for caps in placeholder_regex().captures_iter(text) {
            let name = &caps[1];
            if section.slot() != Some(name) {
                return Err(AppError::Template(format!(
                    "{} references {{{}}}; {}",
                    section.key(),
                    name,
                    match section.slot() {
                        Some(slot) => format!("only {{{}}} is allowed there", slot),
                        None => "this section takes no placeholders".to_string(),
                    }
                )));
            }
        }
    }

    if !placed.contains(&Section::ShotExamples) {
        return Err(AppError::Template(
            "TEMPLATE must place {__SHOT_EXAMPLES__}, which carries the sample".to_string(),
        ));
    }

    let examples_text = sections
        .get(&Section::ShotExamples)
        .map(String::as_str)
        .unwrap_or_default();
    if !examples_text.contains("{__EXAMPLES__}") {
        return Err(AppError::Template(
            "SHOT_EXAMPLES must contain {__EXAMPLES__}".to_string(),
        ));
    }

    Ok(PromptTemplate {
        skeleton,
        sections,
        source: source.to_string(),
    })
}

/// Load and validate a template document from a file.
pub fn load_template(path: &Path) -> AppResult<PromptTemplate> {
    tracing::debug!("Loading template from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Template(format!(
            "Template file not found: {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Template(format!("Failed to read template file {:?}: {}", path, e))
    })?;

    parse_template(&contents)
        .map_err(|e| AppError::Template(format!("{:?}: {}", path, strip_kind(e))))
}

fn strip_kind(err: AppError) -> String {
    match err {
        AppError::Template(msg) => msg,
        other => other.to_string(),
    }
}
