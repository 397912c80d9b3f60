//! OpenAI-compatible chat completions provider.
//!
//! Works with LM Studio, llama.cpp server, vLLM and the OpenAI API itself.
//! The endpoint is the full completions URL, e.g.
//! `http://127.0.0.1:1234/v1/chat/completions`.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::providers::error_body;
use crate::types::{ChatMessage, ProviderType};
use ragfall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Chat completions request format.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
    stream: bool,
}

/// Chat completions response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// OpenAI-compatible LLM client.
pub struct OpenAiCompatClient {
    /// Full chat completions URL
    endpoint: String,

    /// Bearer token, sent only when set
    api_key: Option<String>,

    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client for the local LM Studio default endpoint.
    pub fn new() -> Self {
        Self::with_endpoint(ProviderType::OpenAiCompat.default_endpoint())
    }

    /// Create a client for a custom completions URL.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn to_wire_request(&self, request: &LlmRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn convert_response(
        &self,
        request: &LlmRequest,
        response: ChatCompletionResponse,
    ) -> AppResult<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::model("Completion response contained no choices"))?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            model: response.model.unwrap_or_else(|| request.model.clone()),
            usage,
        })
    }
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider_name(&self) -> &str {
        ProviderType::OpenAiCompat.as_str()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Sending chat completion to {}", self.endpoint);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .json(&self.to_wire_request(request));

        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                AppError::model(format!("Failed to send request to {}: {}", self.endpoint, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(AppError::model_status(status.as_u16(), body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::model(format!("Failed to parse completion response: {}", e)))?;

        let converted = self.convert_response(request, parsed)?;
        tracing::debug!(
            "Completion received ({} chars, {} tokens)",
            converted.content.len(),
            converted.usage.total_tokens
        );

        Ok(converted)
    }
}
