//! Stats command handler.
//!
//! Reports the size of the configured collection.

use clap::Args;
use ragfall_core::{config::AppConfig, AppResult};
use ragfall_retrieval::Session;

/// Show vector store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let session = Session::init(config)?;
        let stats = session.stats().await?;

        if self.json {
            let output = serde_json::json!({
                "collection": stats.collection,
                "url": config.vector_store.url,
                "passages": stats.passages,
                "embeddingModel": config.vector_store.embedding_model,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Collection: {} ({})", stats.collection, config.vector_store.url);
            println!("Passages:   {}", stats.passages);
            println!("Embeddings: {}", config.vector_store.embedding_model);
        }

        Ok(())
    }
}
