//! Ollama completion backend.
//!
//! Calls `POST /api/generate` with streaming off, so one request yields the
//! whole answer. API reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use meteo_core::{AppError, AppResult};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const GENERATE_ENDPOINT: &str = "/api/generate";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "GenerateOptions::is_empty")]
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl GenerateOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.num_predict.is_none()
    }
}

impl<'a> From<&'a LlmRequest> for GenerateRequest<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.params.temperature,
                top_p: request.params.top_p,
                num_predict: request.params.max_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl From<GenerateResponse> for LlmResponse {
    fn from(body: GenerateResponse) -> Self {
        LlmResponse {
            content: body.response,
            model: body.model,
            usage: LlmUsage::new(body.prompt_eval_count, body.eval_count),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Blocking client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    /// Client for `endpoint`, or the default local server. Performs no I/O.
    pub fn new(endpoint: Option<&str>) -> Self {
        let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending prompt to Ollama");

        let url = format!("{}{}", self.base_url, GENERATE_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest::from(request))
            .send()
            .map_err(|e| AppError::Llm(format!("Failed to reach Ollama at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|r| r.error)
                .unwrap_or(text);
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, message)));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| AppError::Llm(format!("Unexpected Ollama response: {}", e)))?;

        tracing::debug!(completion_tokens = body.eval_count, "Ollama answered");
        Ok(body.into())
    }
}
