//! Prompt loader.
//!
//! A workspace file `.ragfall/prompts/<id>.yml` replaces the built-in
//! definition with the same id.

use crate::builtin::{builtin_ids, builtin_source};
use crate::types::PromptDefinition;
use ragfall_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Load a prompt definition by ID, preferring the workspace override.
///
/// # Example
/// ```no_run
/// use ragfall_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "query.rewrite")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some(source) = builtin_source(prompt_id) {
        (source.to_string(), format!("builtin:{}", prompt_id))
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' is neither built in nor present at {:?}",
            prompt_id, prompt_file
        )));
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::debug!("Loaded prompt: {} ({}) from {}", definition.id, definition.title, origin);

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin_ids().map(str::to_string).collect();
    let prompts_dir = prompts_dir(workspace_path);

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !prompt_ids.iter().any(|id| id == stem) {
                        prompt_ids.push(stem.to_string());
                    }
                }
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".ragfall").join("prompts")
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition, requested_id: &str) -> AppResult<()> {
    if def.id != requested_id {
        return Err(AppError::Prompt(format!(
            "Prompt file for '{}' declares id '{}'",
            requested_id, def.id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
