//! Language model integration for ragfall.
//!
//! This crate provides a provider-agnostic abstraction over chat-style
//! completion endpoints. The retrieval pipeline only ever sends a system
//! prompt plus one user message and reads back the generated text.
//!
//! # Providers
//! - **openai**: any OpenAI-compatible chat completions server (default)
//! - **ollama**: Ollama's native `/api/chat`
//!
//! # Example
//! ```no_run
//! use ragfall_llm::{LlmClient, LlmRequest, providers::OpenAiCompatClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiCompatClient::new();
//! let request = LlmRequest::new("What is the capital of France?", "meta-llama-3.1-8b-instruct")
//!     .with_system("Provide concise answers.");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::{ChatMessage, ProviderType};
