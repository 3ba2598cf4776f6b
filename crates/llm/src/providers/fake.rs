//! In-process fake models.
//!
//! These never touch the network. They give tests and dry runs a
//! deterministic collaborator with the same interface as a real provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::types::FakeModel;
use meteo_core::AppResult;

const STATIC_RESPONSE: &str = "positive";
const LIST_RESPONSES: &[&str] = &["uno", "dos", "tres"];

/// Fake LLM client.
#[derive(Debug)]
pub struct FakeClient {
    model: FakeModel,
    responses: Vec<String>,
    cursor: AtomicUsize,
}

impl FakeClient {
    /// Create a fake client with the default answers for `model`.
    pub fn new(model: FakeModel) -> Self {
        let responses = match model {
            FakeModel::Static => vec![STATIC_RESPONSE.to_string()],
            FakeModel::List => LIST_RESPONSES.iter().map(|s| s.to_string()).collect(),
            FakeModel::PromptCopy => Vec::new(),
        };

        Self {
            model,
            responses,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Replace the canned answers (ignored by `PromptCopy`).
    pub fn with_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(&self) -> FakeModel {
        self.model
    }

    fn next_answer(&self, prompt: &str) -> String {
        match self.model {
            FakeModel::PromptCopy => prompt.to_string(),
            FakeModel::Static | FakeModel::List if self.responses.is_empty() => String::new(),
            FakeModel::Static => self.responses[0].clone(),
            FakeModel::List => {
                let i = self.cursor.fetch_add(1, Ordering::Relaxed);
                self.responses[i % self.responses.len()].clone()
            }
        }
    }
}

impl LlmClient for FakeClient {
    fn provider_name(&self) -> &str {
        "fake-llm"
    }

    fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.next_answer(&request.prompt);
        tracing::trace!(model = self.model.as_str(), "Fake completion");

        let prompt_tokens = request.prompt.split_whitespace().count() as u32;
        let completion_tokens = content.split_whitespace().count() as u32;

        Ok(LlmResponse {
            content,
            model: self.model.as_str().to_string(),
            usage: LlmUsage::new(prompt_tokens, completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(client: &FakeClient, prompt: &str) -> String {
        client
            .complete(&LlmRequest::new(prompt, "fake"))
            .unwrap()
            .content
    }

    #[test]
    fn test_static_always_same() {
        let client = FakeClient::new(FakeModel::Static);
        assert_eq!(ask(&client, "a"), "positive");
        assert_eq!(ask(&client, "b"), "positive");
    }

    #[test]
    fn test_prompt_copy_echoes() {
        let client = FakeClient::new(FakeModel::PromptCopy);
        assert_eq!(ask(&client, "EXAMPLE: hi\nANSWER:"), "EXAMPLE: hi\nANSWER:");
    }

    #[test]
    fn test_list_cycles() {
        let client = FakeClient::new(FakeModel::List);
        let answers: Vec<String> = (0..4).map(|_| ask(&client, "x")).collect();
        assert_eq!(answers, vec!["uno", "dos", "tres", "uno"]);
    }

    #[test]
    fn test_custom_responses() {
        let client = FakeClient::new(FakeModel::Static).with_responses(["negativo"]);
        assert_eq!(ask(&client, "x"), "negativo");
        assert_eq!(client.provider_name(), "fake-llm");
    }
}
