//! Retrieval pipeline for ragfall.
//!
//! Similarity search, web search, Reciprocal Rank Fusion, query rewriting
//! and the two-tier answering flow built on them.

pub mod embeddings;
pub mod fusion;
pub mod passage;
pub mod rag;
pub mod rewrite;
pub mod session;
pub mod similarity;
pub mod web;

pub use embeddings::{EmbeddingProvider, OllamaEmbedder};
pub use fusion::{reciprocal_rank_fusion, RrfFusion, DEFAULT_RRF_K};
pub use passage::{Passage, RankedResultSet};
pub use rag::{ask, EscalationState, RagAnswer, Stage};
pub use rewrite::{parse_query_list, QueryRewriter};
pub use session::{Session, SessionSettings, SessionStats};
pub use similarity::{ChromaStore, SimilaritySearch};
pub use web::{format_results, DuckDuckGoSearch, WebResult, WebSearch};
