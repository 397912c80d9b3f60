//! Query rewriting: paraphrases of a question the first pass could not answer.

use ragfall_core::{AppError, AppResult};
use ragfall_llm::{LlmClient, LlmRequest};
use std::sync::Arc;
use tracing::instrument;

/// Characters of raw model output kept in parse errors.
const EXCERPT_LEN: usize = 120;

/// Asks the language model for paraphrases and parses them strictly.
#[derive(Clone)]
pub struct QueryRewriter {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<i32>,
}

impl QueryRewriter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<i32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The request sent for `question`; the context line is present but empty.
    pub fn request(&self, question: &str) -> LlmRequest {
        let mut request = LlmRequest::new(question, &self.model)
            .with_context("")
            .with_system(&self.prompt)
            .with_max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Paraphrase `question`. Model errors propagate unchanged; output that
    /// is not a list of strings is `AppError::RewriteParse`.
    #[instrument(skip(self), fields(provider = self.llm.provider_name()))]
    pub async fn rewrite(&self, question: &str) -> AppResult<Vec<String>> {
        let response = self.llm.complete(&self.request(question)).await?;
        let queries = parse_query_list(&response.content)?;
        tracing::debug!("Rewriter produced {} queries", queries.len());
        Ok(queries)
    }
}

impl std::fmt::Debug for QueryRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRewriter")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

/// Parse model output as a JSON array of strings.
///
/// Surrounding whitespace and one Markdown code fence are accepted. Nothing
/// is evaluated: any other shape is rejected.
pub fn parse_query_list(raw: &str) -> AppResult<Vec<String>> {
    let body = strip_code_fence(raw.trim());

    serde_json::from_str::<Vec<String>>(body).map_err(|e| {
        AppError::RewriteParse(format!(
            "expected a list of strings ({}), got: {}",
            e,
            excerpt(raw)
        ))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop an info string such as `json` on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('[') => body.trim(),
        _ => inner.trim(),
    }
}

fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= EXCERPT_LEN {
        return format!("{:?}", trimmed);
    }
    let cut: String = trimmed.chars().take(EXCERPT_LEN).collect();
    format!("{:?}…", cut)
}
