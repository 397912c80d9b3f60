//! Prompt system for ragfall.
//!
//! This crate provides the system prompts used by the retrieval pipeline:
//! - Built-in YAML prompt definitions compiled into the binary
//! - Workspace overrides in `.ragfall/prompts/<id>.yml`
//! - Handlebars rendering (strict mode, no HTML escaping)
//! - The shared "cannot answer" sentinel

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{render_prompt, PromptSet};
pub use builtin::{ANSWER_CONTEXT_ONLY, ANSWER_FALLBACK, QUERY_REWRITE, SENTINEL};
pub use loader::{list_prompts, load_prompt};
pub use types::{PromptDefinition, PromptOutputSpec};
