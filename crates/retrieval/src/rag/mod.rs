//! Two-tier question answering.
//!
//! The first pass answers from retrieved context only. When the model
//! replies with the sentinel, the question is paraphrased, every paraphrase
//! is retrieved, the result sets are fused with RRF and the fallback prompt
//! answers from the fused passages plus web results.

pub mod ask;
pub mod types;

pub use ask::ask;
pub use types::{EscalationState, RagAnswer, Stage};
