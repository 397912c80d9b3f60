//! Orchestrator result types.

use crate::passage::Passage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    FirstPass,
    Escalated,
}

impl EscalationState {
    pub fn is_escalated(&self) -> bool {
        matches!(self, EscalationState::Escalated)
    }
}

/// Orchestrator stages, used to label spans and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FirstPassRetrieve,
    FirstPassAnswer,
    Rewrite,
    MultiRetrieve,
    Fuse,
    WebAugment,
    FallbackAnswer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FirstPassRetrieve => "first_pass_retrieve",
            Stage::FirstPassAnswer => "first_pass_answer",
            Stage::Rewrite => "rewrite",
            Stage::MultiRetrieve => "multi_retrieve",
            Stage::Fuse => "fuse",
            Stage::WebAugment => "web_augment",
            Stage::FallbackAnswer => "fallback_answer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to one question, with the passages shown as its sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub question: String,

    pub answer: String,

    /// First pass: the leading passages of the context. Escalated: every
    /// fused passage, best first.
    pub sources: Vec<Passage>,

    pub escalation: EscalationState,

    /// Paraphrases produced by the rewriter (escalated runs only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewritten_queries: Vec<String>,

    /// Result sets that reached fusion
    #[serde(default)]
    pub fused_sets: usize,

    /// Whether web results were part of the fallback context
    #[serde(default)]
    pub web_context_used: bool,
}

impl RagAnswer {
    pub fn first_pass(question: &str, answer: String, sources: Vec<Passage>) -> Self {
        Self {
            question: question.to_string(),
            answer,
            sources,
            escalation: EscalationState::FirstPass,
            rewritten_queries: Vec::new(),
            fused_sets: 0,
            web_context_used: false,
        }
    }

    pub fn is_escalated(&self) -> bool {
        self.escalation.is_escalated()
    }
}
