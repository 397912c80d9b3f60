//! ragfall CLI
//!
//! Main entry point for the ragfall command-line tool.
//! Answers questions from a vector store, escalating to query rewriting,
//! rank fusion and web search when the first pass cannot answer.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, QuestionsCommand, StatsCommand};
use ragfall_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// ragfall - retrieval-augmented answers with web fallback
#[derive(Parser, Debug)]
#[command(name = "ragfall")]
#[command(
    about = "Retrieval-augmented answers with rank fusion and web fallback",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGFALL_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGFALL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "RAGFALL_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "RAGFALL_MODEL")]
    model: Option<String>,

    /// Completion endpoint URL
    #[arg(long, global = true, env = "RAGFALL_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question from the collection
    Ask(AskCommand),

    /// List the preset questions
    Questions(QuestionsCommand),

    /// Show vector store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from the config file and environment
    let config = AppConfig::load_with(cli.config.as_deref(), cli.workspace.as_deref())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("ragfall starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Questions(_) => "questions",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Questions(cmd) => cmd.execute().await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed during {}: {}", e.stage_hint(), e),
    }

    result
}

