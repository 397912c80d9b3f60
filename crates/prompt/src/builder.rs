//! Prompt rendering.

use crate::builtin::{ANSWER_CONTEXT_ONLY, ANSWER_FALLBACK, QUERY_REWRITE, SENTINEL};
use crate::loader::load_prompt;
use crate::types::PromptDefinition;
use handlebars::Handlebars;
use ragfall_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// The three rendered system prompts used by one session.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    /// First pass: answer from context only, or emit the sentinel
    pub answer: String,

    /// Second tier: answer from fused context, web results or general knowledge
    pub fallback: String,

    /// Paraphrase generation, JSON list output
    pub rewrite: String,
}

impl PromptSet {
    /// Render the prompts, honouring overrides in the workspace.
    pub fn load(workspace_path: &Path, rewrite_count: usize) -> AppResult<Self> {
        let variables = prompt_variables(rewrite_count);

        let answer = render_prompt(&load_prompt(workspace_path, ANSWER_CONTEXT_ONLY)?, &variables)?;
        if !answer.contains(SENTINEL) {
            tracing::warn!(
                "Prompt '{}' does not mention the sentinel \"{}\"; escalation may never trigger",
                ANSWER_CONTEXT_ONLY,
                SENTINEL
            );
        }

        Ok(Self {
            answer,
            fallback: render_prompt(&load_prompt(workspace_path, ANSWER_FALLBACK)?, &variables)?,
            rewrite: render_prompt(&load_prompt(workspace_path, QUERY_REWRITE)?, &variables)?,
        })
    }
}

fn prompt_variables(rewrite_count: usize) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    variables.insert("sentinel".to_string(), SENTINEL.to_string());
    variables.insert("count".to_string(), rewrite_count.to_string());
    variables
}

/// Render a prompt template with variables.
///
/// Strict mode turns a reference to an unknown variable into an error
/// instead of an empty string.
pub fn render_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string(&definition.id, &definition.template)
        .map_err(|e| {
            AppError::Prompt(format!(
                "Failed to register template '{}': {}",
                definition.id, e
            ))
        })?;

    let rendered = handlebars
        .render(&definition.id, variables)
        .map_err(|e| {
            AppError::Prompt(format!("Failed to render template '{}': {}", definition.id, e))
        })?;

    Ok(rendered.trim().to_string())
}
