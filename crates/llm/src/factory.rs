//! LLM provider factory.
//!
//! Builds an `LlmClient` from the provider name in the application
//! configuration.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatClient};
use crate::types::ProviderType;
use ragfall_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL; provider default otherwise
/// * `api_key` - Optional bearer token (OpenAI-compatible servers only)
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            provider
        ))
    })?;

    let endpoint = endpoint.unwrap_or_else(|| provider_type.default_endpoint());
    tracing::debug!("Creating {} client for {}", provider_type.as_str(), endpoint);

    match provider_type {
        ProviderType::OpenAiCompat => {
            let mut client = OpenAiCompatClient::with_endpoint(endpoint);
            if let Some(key) = api_key {
                client = client.with_api_key(key);
            }
            Ok(Arc::new(client))
        }
        ProviderType::Ollama => {
            if api_key.is_some() {
                tracing::warn!("Ollama provider ignores the configured API key");
            }
            Ok(Arc::new(OllamaClient::with_base_url(endpoint)))
        }
    }
}
