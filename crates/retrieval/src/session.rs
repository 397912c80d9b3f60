//! Question-answering session: the clients and settings shared by every
//! question asked against one vector store.

use crate::embeddings::OllamaEmbedder;
use crate::fusion::RrfFusion;
use crate::rewrite::QueryRewriter;
use crate::similarity::{ChromaStore, SimilaritySearch};
use crate::web::{DuckDuckGoSearch, WebSearch};
use ragfall_core::{AppConfig, AppResult};
use ragfall_llm::{create_client, LlmClient};
use ragfall_prompt::PromptSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Per-session knobs, resolved from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<i32>,

    /// Collection name, for display
    pub collection: String,

    /// Passages requested per similarity query
    pub limit: usize,

    /// Passages kept after fusion
    pub top_k: usize,

    /// Sources shown with a first-pass answer
    pub sources_shown: usize,

    pub web_max_results: usize,

    pub llm_timeout: Duration,
    pub search_timeout: Duration,
    pub web_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            collection: config.vector_store.collection.clone(),
            limit: config.retrieval.limit,
            top_k: config.retrieval.top_k,
            sources_shown: config.retrieval.sources_shown,
            web_max_results: config.web_search.max_results,
            llm_timeout: config.llm_timeout(),
            search_timeout: config.search_timeout(),
            web_timeout: config.web_timeout(),
        }
    }
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub collection: String,
    pub passages: usize,
}

/// Clients and prompts for answering questions.
///
/// Built once and passed by reference to [`crate::rag::ask`]. Handles are
/// read-only, so one session can serve concurrent questions.
pub struct Session {
    similarity: Arc<dyn SimilaritySearch>,
    web: Option<Arc<dyn WebSearch>>,
    llm: Arc<dyn LlmClient>,
    prompts: PromptSet,
    fusion: RrfFusion,
    settings: SessionSettings,
}

impl Session {
    /// Build the configured clients: Chroma with Ollama query embeddings,
    /// DuckDuckGo (unless disabled) and the configured LLM provider.
    pub fn init(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let http = reqwest::Client::new();
        let embedder = OllamaEmbedder::with_client(
            http.clone(),
            &config.vector_store.embedding_endpoint,
            &config.vector_store.embedding_model,
        );
        let similarity = ChromaStore::with_client(
            http.clone(),
            &config.vector_store.url,
            &config.vector_store.collection,
            Arc::new(embedder),
        );

        let web: Option<Arc<dyn WebSearch>> = if config.web_search.enabled {
            Some(Arc::new(DuckDuckGoSearch::with_client(
                http.clone(),
                &config.web_search.endpoint,
            )))
        } else {
            tracing::info!("Web search disabled");
            None
        };

        let api_key = config.resolve_api_key();
        let llm = create_client(&config.provider, config.endpoint.as_deref(), api_key.as_deref())?;
        let prompts = PromptSet::load(&config.workspace, config.retrieval.rewrite_count)?;
        let fusion = RrfFusion::new(config.retrieval.rrf_k)?;

        tracing::info!(
            "Session ready: collection '{}' at {}, provider {} ({})",
            config.vector_store.collection,
            config.vector_store.url,
            llm.provider_name(),
            config.model
        );

        Ok(Self {
            similarity: Arc::new(similarity),
            web,
            llm,
            prompts,
            fusion,
            settings: SessionSettings::from_config(config),
        })
    }

    /// Assemble a session from existing clients.
    pub fn from_parts(
        similarity: Arc<dyn SimilaritySearch>,
        web: Option<Arc<dyn WebSearch>>,
        llm: Arc<dyn LlmClient>,
        prompts: PromptSet,
        settings: SessionSettings,
    ) -> Self {
        Self {
            similarity,
            web,
            llm,
            prompts,
            fusion: RrfFusion::default(),
            settings,
        }
    }

    /// Drop the web client; the fallback tier then runs on fused passages only.
    pub fn without_web(mut self) -> Self {
        self.web = None;
        self
    }

    /// Forget cached backend state, e.g. after the collection was re-indexed.
    pub async fn reset(&self) {
        self.similarity.reset().await;
        tracing::info!("Session reset");
    }

    pub async fn stats(&self) -> AppResult<SessionStats> {
        Ok(SessionStats {
            collection: self.settings.collection.clone(),
            passages: self.similarity.count().await?,
        })
    }

    pub fn similarity(&self) -> &Arc<dyn SimilaritySearch> {
        &self.similarity
    }

    pub fn web(&self) -> Option<&Arc<dyn WebSearch>> {
        self.web.as_ref()
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    pub fn fusion(&self) -> &RrfFusion {
        &self.fusion
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Rewriter using this session's model and rewrite prompt.
    pub fn rewriter(&self) -> QueryRewriter {
        QueryRewriter::new(self.llm.clone(), &self.settings.model, &self.prompts.rewrite)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.llm.provider_name())
            .field("web", &self.web.is_some())
            .field("fusion", &self.fusion)
            .field("settings", &self.settings)
            .finish()
    }
}
