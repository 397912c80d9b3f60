//! Query embedding.
//!
//! The vector store's HTTP API does not embed text server-side, so query
//! strings are embedded here before being sent as `query_embeddings`.

use async_trait::async_trait;
use ragfall_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Model identifier
    fn model_name(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Ollama embedding provider (`POST /api/embeddings`).
///
/// Errors surface as `AppError::Retrieval`: from the pipeline's point of
/// view a query that cannot be embedded cannot be searched.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Error response from Ollama API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, model)
    }

    /// Share an existing HTTP connection pool.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::Retrieval(format!(
                    "Failed to reach embedding service at {}: {}",
                    url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(AppError::Retrieval(format!(
                "Embedding model '{}' failed ({}): {}",
                self.model, status, message
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Invalid embedding response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(AppError::Retrieval(format!(
                "Embedding model '{}' returned an empty vector",
                self.model
            )));
        }

        Ok(parsed.embedding)
    }
}
