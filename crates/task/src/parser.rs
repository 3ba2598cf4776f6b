//! Output parsers.
//!
//! Turn the raw text of an LLM answer into the task result. An empty result
//! means the answer held nothing usable.

use crate::types::TaskType;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Separator an answer may use between several labels.
pub const LABEL_SEPARATOR: &str = ",";

const REFUSAL_MARKER: &str = "as an AI language model";

static TAGGED_FENCE_REGEX: OnceLock<Regex> = OnceLock::new();
static FENCE_REGEX: OnceLock<Regex> = OnceLock::new();

fn tagged_fence_regex() -> &'static Regex {
    TAGGED_FENCE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z0-9_+-]+\n(.*?)```").expect("TAGGED_FENCE_REGEX is valid")
    })
}

fn fence_regex() -> &'static Regex {
    FENCE_REGEX.get_or_init(|| Regex::new(r"(?s)```(.*?)```").expect("FENCE_REGEX is valid"))
}

/// Parses raw model output.
pub trait OutputParser: Send + Sync + fmt::Debug {
    fn parse(&self, raw: &str) -> Vec<String>;
}

/// Resolve the parser for a task.
pub fn create_parser(task_type: TaskType, labels: &[String]) -> Box<dyn OutputParser> {
    match task_type {
        TaskType::Classification => Box::new(ClassificationParser::new(labels.to_vec())),
        TaskType::JsonInfoExtraction => Box::new(JsonParser),
        TaskType::CodeGeneration => Box::new(CodeParser),
        TaskType::ApiGeneration | TaskType::ApiCorrection => Box::new(ApiParser),
        TaskType::Qa | TaskType::Summarization => Box::new(TextParser),
    }
}

/// Returns every known label the answer mentions, in label order.
#[derive(Debug, Clone)]
pub struct ClassificationParser {
    labels: Vec<String>,
}

impl ClassificationParser {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

impl OutputParser for ClassificationParser {
    fn parse(&self, raw: &str) -> Vec<String> {
        let lowered = raw.to_lowercase().replace(LABEL_SEPARATOR, " ");
        let words: Vec<&str> = lowered
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_'))
            .filter(|w| !w.is_empty())
            .collect();

        self.labels
            .iter()
            .filter(|label| words.contains(&label.to_lowercase().as_str()))
            .cloned()
            .collect()
    }
}

/// Returns the first balanced `{...}` object that parses as JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonParser;

impl OutputParser for JsonParser {
    fn parse(&self, raw: &str) -> Vec<String> {
        balanced_objects(raw)
            .map(|candidate| candidate.replace('\'', "\""))
            .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
            .into_iter()
            .collect()
    }
}

/// Outermost `{...}` spans in order of appearance.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans.into_iter()
}

/// Returns the body of the first fenced code block, else the trimmed text.
#[derive(Debug, Clone, Copy)]
pub struct CodeParser;

impl OutputParser for CodeParser {
    fn parse(&self, raw: &str) -> Vec<String> {
        let body = tagged_fence_regex()
            .captures(raw)
            .or_else(|| fence_regex().captures(raw))
            .and_then(|caps| caps.get(1))
            .map_or(raw, |m| m.as_str());

        non_empty(body)
    }
}

/// Extracts an OpenAPI document from the answer.
#[derive(Debug, Clone, Copy)]
pub struct ApiParser;

impl OutputParser for ApiParser {
    fn parse(&self, raw: &str) -> Vec<String> {
        let text = raw.replace("{{", "{").replace("}}", "}");
        if text.contains(REFUSAL_MARKER) {
            tracing::debug!("Model refused to produce an API definition");
            return Vec::new();
        }

        let text = tagged_fence_regex()
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map_or(text.as_str(), |m| m.as_str());
        let text = fence_regex()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map_or(text, |m| m.as_str());

        let text = match text.find("openapi:") {
            Some(offset) => &text[offset..],
            None => text,
        };

        non_empty(&text.replace("```", ""))
    }
}

/// Returns the trimmed answer.
#[derive(Debug, Clone, Copy)]
pub struct TextParser;

impl OutputParser for TextParser {
    fn parse(&self, raw: &str) -> Vec<String> {
        non_empty(raw)
    }
}

fn non_empty(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}
