//! Pipeline scenarios.

mod end_to_end;

use crate::types::{PipelineParams, TaskType};
use meteo_llm::{FakeClient, FakeModel, LlmClient};
use meteo_prompt::{Language, TemplateRegistry};
use std::sync::Arc;

pub(crate) fn registry() -> TemplateRegistry {
    TemplateRegistry::with_builtins().unwrap()
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Spanish sentiment classifier backed by the offline fakes.
pub(crate) fn sentiment_params() -> PipelineParams {
    PipelineParams::new(TaskType::Classification, Language::Es)
        .with_model("fake-llm", "fake-static")
        .with_labels(["positivo", "neutral", "negativo"])
}

pub(crate) fn answering(answer: &str) -> Arc<dyn LlmClient> {
    Arc::new(FakeClient::new(FakeModel::Static).with_responses([answer]))
}
