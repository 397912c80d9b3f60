//! Prompt definitions compiled into the binary.

/// Exact first-pass output that triggers escalation.
///
/// Rendered into the context-only prompt and compared against the answer,
/// so the two can never drift apart.
pub const SENTINEL: &str = "Non posso rispondere.";

pub const ANSWER_CONTEXT_ONLY: &str = "answer.context_only";
pub const ANSWER_FALLBACK: &str = "answer.fallback";
pub const QUERY_REWRITE: &str = "query.rewrite";

const BUILTIN_PROMPTS: [(&str, &str); 3] = [
    (
        ANSWER_CONTEXT_ONLY,
        include_str!("../prompts/answer.context_only.yml"),
    ),
    (ANSWER_FALLBACK, include_str!("../prompts/answer.fallback.yml")),
    (QUERY_REWRITE, include_str!("../prompts/query.rewrite.yml")),
];

/// Raw YAML of a built-in prompt.
pub fn builtin_source(prompt_id: &str) -> Option<&'static str> {
    BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, source)| *source)
}

/// Ids of all built-in prompts.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTIN_PROMPTS.iter().map(|(id, _)| *id)
}
