//! Ask command handler.
//!
//! Answers one question through the two-tier retrieval flow.

use crate::commands::questions::preset;
use clap::Args;
use ragfall_core::{config::AppConfig, AppError, AppResult};
use ragfall_retrieval::{ask, RagAnswer, Session};
use std::path::PathBuf;

/// Characters of each source shown in text output.
const MAX_SNIPPET_LENGTH: usize = 200;

/// Ask a question about the indexed collection
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Ask a preset question by number (see `ragfall questions`)
    #[arg(long, conflicts_with_all = ["question", "file"])]
    pub preset: Option<usize>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Number of sources shown with a first-pass answer
    #[arg(long)]
    pub sources: Option<usize>,

    /// Skip web search in the fallback tier
    #[arg(long)]
    pub no_web: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;

        let mut config = config.clone();
        if let Some(sources) = self.sources {
            config.retrieval.sources_shown = sources;
        }

        let mut session = Session::init(&config)?;
        if self.no_web {
            session = session.without_web();
        }
        let answer = ask(&session, &question).await?;

        if self.json {
            let output = serde_json::json!({
                "answer": answer,
                "model": config.model,
                "provider": config.provider,
                "collection": config.vector_store.collection,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_answer(&answer);
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        if let Some(number) = self.preset {
            return Ok(preset(number)?.to_string());
        }

        if let Some(ref question) = self.question {
            return Ok(question.clone());
        }

        if let Some(ref path) = self.file {
            let question = std::fs::read_to_string(path).map_err(|e| {
                AppError::InvalidInput(format!("Failed to read question file {:?}: {}", path, e))
            })?;
            return Ok(question.trim().to_string());
        }

        Err(AppError::InvalidInput(
            "No question provided; pass it as an argument, with --file or --preset".to_string(),
        ))
    }
}

fn print_answer(answer: &RagAnswer) {
    if answer.is_escalated() {
        tracing::info!(
            "Answered after escalation ({} rewritten queries, {} result sets fused)",
            answer.rewritten_queries.len(),
            answer.fused_sets
        );
    }

    println!("{}", answer.answer);

    if answer.sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for (idx, source) in answer.sources.iter().enumerate() {
        match source.label() {
            Some(label) => println!("{:>2}. [{}] {}", idx + 1, label, snippet(&source.content)),
            None => println!("{:>2}. {}", idx + 1, snippet(&source.content)),
        }
    }
}

fn snippet(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_SNIPPET_LENGTH {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_SNIPPET_LENGTH).collect();
    format!("{}...", cut)
}
