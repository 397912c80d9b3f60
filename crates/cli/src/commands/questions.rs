//! Questions command handler.
//!
//! Lists the preset questions accepted by `ask --preset`.

use clap::Args;
use ragfall_core::{AppError, AppResult};

/// Sample questions about the Olympic Games collection.
pub const PRESET_QUESTIONS: [&str; 7] = [
    "Quale città ospitò i primi Giochi Olimpici estivi dell'età moderna? In che anno?",
    "Quante volte i Giochi Olimpici estivi sono stati ospitati in Francia (Parigi 2024 incluso)?",
    "Quanto tempo è passato dall'ultima volta che Parigi ha ospitato le olimpiadi estive?",
    "La prima edizione dei Giochi Olimpici invernali è avvenuta prima della prima edizione \
     dei Giochi Olimpici estivi?",
    "L'arrampicata sportiva non è uno sport olimpico: vero o falso?",
    "Quale è il numero medio di ori olimpici per edizione per l'Italia?",
    "Chi è l'ultima vincitrice dei 100 metri piani? Con quale tempo?",
];

/// Look up a preset by its 1-based number.
pub fn preset(number: usize) -> AppResult<&'static str> {
    number
        .checked_sub(1)
        .and_then(|idx| PRESET_QUESTIONS.get(idx))
        .copied()
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "No preset question {}; choose 1-{}",
                number,
                PRESET_QUESTIONS.len()
            ))
        })
}

/// List the preset questions
#[derive(Args, Debug)]
pub struct QuestionsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QuestionsCommand {
    pub async fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing questions command");

        if self.json {
            println!("{}", serde_json::to_string_pretty(&PRESET_QUESTIONS)?);
            return Ok(());
        }

        for (idx, question) in PRESET_QUESTIONS.iter().enumerate() {
            println!("{:>2}. {}", idx + 1, question);
        }

        Ok(())
    }
}
