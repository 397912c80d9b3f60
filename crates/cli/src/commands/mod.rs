//! Command handlers for the ragfall CLI.

pub mod ask;
pub mod questions;
pub mod stats;

pub use ask::AskCommand;
pub use questions::QuestionsCommand;
pub use stats::StatsCommand;
