//! Error types for ragfall.
//!
//! This module defines a unified error enum covering every failure category
//! of the question-answering pipeline: retrieval, web search, query
//! rewriting, model calls and escalation, plus the ambient configuration,
//! I/O, prompt and serialization errors.

use thiserror::Error;

/// Unified error type for ragfall.
///
/// All library functions return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid caller input (empty question, zero limit, bad fusion constant)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vector store unreachable, misconfigured or empty
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Web search provider failure (never raised for zero results)
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Query rewriter output is not a list of strings
    #[error("Rewrite parse error: {0}")]
    RewriteParse(String),

    /// Language model backend failure.
    ///
    /// `status` carries the HTTP status when the backend answered;
    /// it is `None` for transport failures and timeouts.
    #[error("{}", format_model_error(.status, .message))]
    Model {
        status: Option<u16>,
        message: String,
    },

    /// Every rewritten query failed during multi-query retrieval
    #[error("Escalation error: {0}")]
    Escalation(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn format_model_error(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Model error ({}): {}", code, message),
        None => format!("Model error: {}", message),
    }
}

impl AppError {
    /// Build a model error from a backend status code and body.
    pub fn model_status(status: u16, message: impl Into<String>) -> Self {
        AppError::Model {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build a model error that never reached the backend.
    pub fn model(message: impl Into<String>) -> Self {
        AppError::Model {
            status: None,
            message: message.into(),
        }
    }

    /// Short label of the failing component, used in CLI output.
    pub fn stage_hint(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::Io(_) => "io",
            AppError::InvalidInput(_) => "input",
            AppError::Retrieval(_) => "similarity search",
            AppError::WebSearch(_) => "web search",
            AppError::RewriteParse(_) => "query rewriting",
            AppError::Model { .. } => "language model",
            AppError::Escalation(_) => "multi-query retrieval",
            AppError::Prompt(_) => "prompt",
            AppError::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
