//! Prompt assembler.
//!
//! Turns a validated template, caller context, the selected examples and one
//! live sample into the final prompt text. Substitution is a single pass:
//! values are never rescanned, so a sample containing `{__NAME__}` stays
//! literal.

use crate::loader::placeholder_regex;
use crate::types::{ExampleFormat, PromptContext, PromptTemplate, Section, Shot};
use meteo_core::{AppError, AppResult};
use regex::Captures;
use std::collections::BTreeMap;

/// Compose the prompt for one sample.
///
/// Optional sections render only when the caller supplied a non-empty value;
/// an empty section leaves no stray blank lines behind. The output is a pure
/// function of the inputs.
///
/// # Example
/// ```
/// use meteo_prompt::{compose, parse_template, ExampleFormat, Language, PromptContext, Shot};
///
/// let template = parse_template(
///     "TEMPLATE: \"{__PROMPT_LABELS__}\\n{__SHOT_EXAMPLES__}\"\n\
///      PROMPT_LABELS: \"Labels: {__LABELS__}\"\n\
///      SHOT_EXAMPLES: \"{__EXAMPLES__}\"\n",
/// )
/// .unwrap();
/// let context =
///     PromptContext::new(Language::En, ExampleFormat::Paired).with_labels(["yes", "no"]);
/// let shots = [Shot::new("it works", Some("yes".to_string()))];
///
/// let prompt = compose(&template, &context, &shots, "it broke").unwrap();
/// assert_eq!(
///     prompt,
///     "Labels: yes, no\nEXAMPLE: it works\nANSWER: yes\n\nEXAMPLE: it broke\nANSWER:"
/// );
/// ```
pub fn compose(
    template: &PromptTemplate,
    context: &PromptContext,
    examples: &[Shot],
    sample: &str,
) -> AppResult<String> {
    let rendered: BTreeMap<Section, String> = template
        .sections()
        .map(|(section, text)| (section, render_section(section, text, context, examples, sample)))
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut unresolved: Option<String> = None;

    for line in template.skeleton().lines() {
        let filled = placeholder_regex().replace_all(line, |caps: &Captures| {
            match Section::from_placeholder(&caps[1]).and_then(|s| rendered.get(&s)) {
                Some(value) => value.clone(),
                None => {
                    unresolved.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });

        let filled = filled.trim_end();
        if filled.trim().is_empty() {
            // Keep at most one blank line between blocks
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
        } else {
            lines.push(filled.to_string());
        }
    }

    if let Some(name) = unresolved {
        return Err(AppError::Template(format!(
            "TEMPLATE references section {{{}}} that the document does not define",
            name
        )));
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    tracing::trace!(examples = examples.len(), "Composed prompt");

    Ok(lines.join("\n"))
}

fn render_section(
    section: Section,
    text: &str,
    context: &PromptContext,
    examples: &[Shot],
    sample: &str,
) -> String {
    match section {
        Section::Domain => fill_slot(text, section, non_empty(context.domain.as_deref())),
        Section::Detail => fill_slot(text, section, non_empty(context.detail.as_deref())),
        Section::Labels => {
            let joined = context.labels.join(", ");
            fill_slot(text, section, non_empty(Some(joined.as_str())))
        }
        Section::ShotExamples => {
            let block = examples_block(context, examples, sample);
            fill_slot(text, section, Some(block.as_str()))
        }
        Section::ChainOfThought => context
            .chain_of_thought
            .as_deref()
            .unwrap_or(text)
            .trim()
            .to_string(),
        Section::AnswerFormat => context
            .answer_format
            .as_deref()
            .unwrap_or(text)
            .trim()
            .to_string(),
        Section::Instruction => text.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Substitute the section's own slot, or render nothing without a value.
fn fill_slot(text: &str, section: Section, value: Option<&str>) -> String {
    match (value, section.slot()) {
        (Some(value), Some(slot)) => text.replace(&format!("{{{}}}", slot), value),
        _ => String::new(),
    }
}

/// Render the examples followed by the unanswered live sample.
fn examples_block(context: &PromptContext, examples: &[Shot], sample: &str) -> String {
    let lang = context.language;
    let mut blocks: Vec<String> = examples
        .iter()
        .map(|shot| match (context.format, &shot.output) {
            (ExampleFormat::Paired, Some(output)) => format!(
                "{}: {}\n{}: {}",
                lang.input_tag(),
                shot.input,
                lang.output_tag(),
                output
            ),
            (ExampleFormat::Paired, None) => format!("{}: {}", lang.input_tag(), shot.input),
            (ExampleFormat::InputOnly, _) => shot.input.clone(),
        })
        .collect();

    let live_tag = match context.format {
        ExampleFormat::Paired => lang.input_tag(),
        ExampleFormat::InputOnly => lang.question_tag(),
    };
    blocks.push(format!("{}: {}\n{}:", live_tag, sample, lang.output_tag()));

    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_template;
    use crate::types::Language;
    use pretty_assertions::assert_eq;

    const CLASSIFY: &str = r#"
TEMPLATE: |
    You are a text classifier.
    {__PROMPT_DOMAIN__}
    {__PROMPT_LABELS__}
    {__PROMPT_DETAIL__}

    {__CHAIN_THOUGHT__}

    {__SHOT_EXAMPLES__}

    {__ANSWER_FORMAT__}
PROMPT_DOMAIN: "The texts come from the {__DOMAIN__} domain."
PROMPT_LABELS: "Valid labels: {__LABELS__}."
PROMPT_DETAIL: "{__DETAIL__}"
CHAIN_THOUGHT: ""
SHOT_EXAMPLES: "{__EXAMPLES__}"
ANSWER_FORMAT: "Reply with the label only."
"#;

    fn shots() -> Vec<Shot> {
        vec![
            Shot::new("estoy feliz", Some("positivo".to_string())),
            Shot::new("no me gusta", Some("negativo".to_string())),
        ]
    }

    #[test]
    fn test_compose_full_prompt() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::Es, ExampleFormat::Paired)
            .with_domain("product reviews")
            .with_labels(["positivo", "negativo"]);

        let prompt = compose(&template, &context, &shots(), "que guay!!").unwrap();

        assert_eq!(
            prompt,
            "You are a text classifier.\n\
             The texts come from the product reviews domain.\n\
             Valid labels: positivo, negativo.\n\
             \n\
             EJEMPLO: estoy feliz\n\
             RESPUESTA: positivo\n\
             \n\
             EJEMPLO: no me gusta\n\
             RESPUESTA: negativo\n\
             \n\
             EJEMPLO: que guay!!\n\
             RESPUESTA:\n\
             \n\
             Reply with the label only."
        );
    }

    #[test]
    fn test_empty_sections_leave_no_blank_runs() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::Paired);

        let prompt = compose(&template, &context, &[], "hello").unwrap();

        assert_eq!(
            prompt,
            "You are a text classifier.\n\nEXAMPLE: hello\nANSWER:\n\nReply with the label only."
        );
        assert!(!prompt.contains("\n\n\n"));
    }

    #[test]
    fn test_caller_overrides_static_sections() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::Paired)
            .with_chain_of_thought("Think step by step.")
            .with_answer_format("");

        let prompt = compose(&template, &context, &[], "hello").unwrap();

        assert!(prompt.contains("Think step by step."));
        assert!(!prompt.contains("Reply with the label only."));
        assert!(prompt.ends_with("ANSWER:"));
    }

    #[test]
    fn test_input_only_examples() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::InputOnly)
            .with_answer_format("");
        let passages = vec![Shot::new("Rust was first released in 2015.", None)];

        let prompt = compose(&template, &context, &passages, "When was Rust released?").unwrap();

        assert!(prompt.contains(
            "Rust was first released in 2015.\n\nQUESTION: When was Rust released?\nANSWER:"
        ));
        assert!(!prompt.contains("EXAMPLE:"));
    }

    #[test]
    fn test_sample_placeholders_stay_literal() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::Paired).with_domain("x");

        let prompt = compose(&template, &context, &[], "inject {__PROMPT_DOMAIN__} {x}").unwrap();

        assert!(prompt.contains("EXAMPLE: inject {__PROMPT_DOMAIN__} {x}"));
        assert_eq!(prompt.matches("The texts come from the x domain.").count(), 1);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::Paired)
            .with_labels(["a", "b"])
            .with_detail("Be strict.");

        let first = compose(&template, &context, &shots(), "sample").unwrap();
        let second = compose(&template, &context, &shots(), "sample").unwrap();
        assert_eq!(first, second);
        assert!(first.contains("Be strict."));
    }

    #[test]
    fn test_multiline_sample_is_preserved() {
        let template = parse_template(CLASSIFY).unwrap();
        let context = PromptContext::new(Language::En, ExampleFormat::Paired);

        let sample = "fn main() {\n    println!(\"hi\");\n}";
        let prompt = compose(&template, &context, &[], sample).unwrap();
        assert!(prompt.contains("    println!(\"hi\");"));
    }
}
