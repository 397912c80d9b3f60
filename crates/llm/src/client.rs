//! LLM client abstraction and request/response types.

use ragfall_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// LLM completion request.
///
/// The user message is built from the question and the optional context,
/// see [`LlmRequest::user_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The question being answered
    pub question: String,

    /// Retrieved context; `Some("")` still emits a context line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Model identifier
    pub model: String,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate (`-1` means no limit on OpenAI-compatible servers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(question: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            model: model.into(),
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Attach retrieved context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: Option<i32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// `Question: {q}`, followed by `\nContext: {context}` when context is set.
    pub fn user_message(&self) -> String {
        let mut message = format!("Question: {}", self.question);
        if let Some(ref context) = self.context {
            message.push_str("\nContext: ");
            message.push_str(context);
        }
        message
    }

    /// System message (when set) followed by the user message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.user_message()));
        messages
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for LLM providers.
///
/// Implementations map backend failures to `AppError::Model`, keeping the
/// HTTP status and body when the backend answered with a non-success status.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "openai", "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
