//! Similarity search over a Chroma-compatible vector store.

use crate::embeddings::EmbeddingProvider;
use crate::passage::{Passage, RankedResultSet};
use async_trait::async_trait;
use ragfall_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Metadata keys written by the ingestion pipeline.
const TITLE_KEY: &str = "Title";
const SECTION_KEY: &str = "Paragraph";

/// Trait for similarity search backends.
///
/// Implementations return passages ordered by increasing distance and do
/// not retry; retry policy belongs to the caller.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Retrieve at most `limit` passages for `query`.
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<RankedResultSet>;

    /// Number of passages in the collection.
    async fn count(&self) -> AppResult<usize>;

    /// Drop cached backend state, e.g. after the collection was rebuilt.
    async fn reset(&self) {}
}

/// Chroma HTTP client bound to one collection.
#[derive(Debug)]
pub struct ChromaStore {
    client: Client,
    base_url: String,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    /// Collection id, resolved on first use
    collection_id: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: [&'a str; 4],
}

/// Chroma's query response: one inner list per query embedding.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    uris: Option<Vec<Vec<Option<String>>>>,
}

impl ChromaStore {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::with_client(Client::new(), base_url, collection, embedder)
    }

    /// Share an existing HTTP connection pool.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
            collection_id: RwLock::new(None),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Resolve (and cache) the collection id.
    pub async fn collection_id(&self) -> AppResult<String> {
        if let Some(ref id) = *self.collection_id.read().await {
            return Ok(id.clone());
        }

        let mut cached = self.collection_id.write().await;
        if let Some(ref id) = *cached {
            return Ok(id.clone());
        }

        let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
        tracing::debug!("Resolving collection '{}' at {}", self.collection, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::Retrieval(format!("Vector store unreachable at {}: {}", self.base_url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Retrieval(format!(
                "Collection '{}' is not available ({}): {}",
                self.collection, status, body
            )));
        }

        let info: CollectionInfo = response.json().await.map_err(|e| {
            AppError::Retrieval(format!("Invalid collection response: {}", e))
        })?;

        tracing::info!("Using collection '{}' ({})", self.collection, info.id);
        *cached = Some(info.id.clone());
        Ok(info.id)
    }
}

#[async_trait]
impl SimilaritySearch for ChromaStore {
    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<RankedResultSet> {
        if limit == 0 {
            return Err(AppError::InvalidInput(
                "Similarity search limit must be at least 1".to_string(),
            ));
        }

        let embedding = self.embedder.embed(query).await?;
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/query", self.base_url, id);

        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: limit,
            include: ["documents", "metadatas", "distances", "uris"],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Vector store query failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Retrieval(format!(
                "Vector store query failed ({}): {}",
                status, body
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Invalid query response: {}", e)))?;

        let passages = passages_from_response(parsed);
        if passages.is_empty() {
            return Err(AppError::Retrieval(format!(
                "Collection '{}' returned no passages; it is empty or has not been indexed",
                self.collection
            )));
        }

        tracing::debug!("Retrieved {} passages", passages.len());
        Ok(RankedResultSet::new(query, passages))
    }

    async fn count(&self) -> AppResult<usize> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/count", self.base_url, id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Vector store count failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "Vector store count failed ({})",
                response.status()
            )));
        }

        response
            .json::<usize>()
            .await
            .map_err(|e| AppError::Retrieval(format!("Invalid count response: {}", e)))
    }

    async fn reset(&self) {
        *self.collection_id.write().await = None;
        tracing::debug!("Cleared cached id for collection '{}'", self.collection);
    }
}

/// Read the first query's results, closest first.
///
/// Entries without a document are skipped; metadata, distances and uris are
/// matched by position.
fn passages_from_response(response: QueryResponse) -> Vec<Passage> {
    let documents = first_row(response.documents);
    let mut metadatas = first_row(response.metadatas).into_iter();
    let mut distances = first_row(response.distances).into_iter();
    let mut uris = first_row(response.uris).into_iter();

    let mut passages: Vec<Passage> = documents
        .into_iter()
        .filter_map(|document| {
            let metadata = metadatas.next().flatten();
            let distance = distances.next().flatten();
            let uri = uris.next().flatten();

            let mut passage = Passage::new(document?);
            passage.distance = distance;
            passage.uri = uri;
            if let Some(metadata) = metadata {
                passage.title = metadata_string(&metadata, TITLE_KEY);
                passage.section = metadata_string(&metadata, SECTION_KEY);
            }
            Some(passage)
        })
        .collect();

    // Chroma already sorts; this keeps the contract for other servers.
    passages.sort_by(|a, b| {
        let a = a.distance.unwrap_or(f32::INFINITY);
        let b = b.distance.unwrap_or(f32::INFINITY);
        a.total_cmp(&b)
    });

    passages
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|rows| rows.into_iter().next()).unwrap_or_default()
}

fn metadata_string(
    metadata: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    metadata.get(key).map(|value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
