//! Reciprocal Rank Fusion.
//!
//! `score(d) = Σ 1 / (rank + c)` over every result set containing `d`,
//! with 0-based ranks. Passages are keyed by their text, so identical text
//! coming from different sources merges into one entry.

use ragfall_core::{AppError, AppResult};
use std::collections::HashMap;

/// Default smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// RRF engine with a fixed smoothing constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    k: f64,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl RrfFusion {
    /// Create an engine; `k` must be finite and positive.
    pub fn new(k: f64) -> AppResult<Self> {
        if !k.is_finite() || k <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "RRF constant must be a positive number, got {}",
                k
            )));
        }
        Ok(Self { k })
    }

    /// Fuse ranked lists and return at most `top_k` passage contents.
    ///
    /// Ties keep first-seen order. Duplicates inside one list are not
    /// collapsed: each occurrence adds its own term.
    pub fn fuse<S: AsRef<str>>(&self, result_sets: &[Vec<S>], top_k: usize) -> Vec<String> {
        self.fuse_scored(result_sets, top_k)
            .into_iter()
            .map(|(content, _)| content)
            .collect()
    }

    /// Same as [`RrfFusion::fuse`], keeping the accumulated scores.
    pub fn fuse_scored<S: AsRef<str>>(
        &self,
        result_sets: &[Vec<S>],
        top_k: usize,
    ) -> Vec<(String, f64)> {
        // Vec keeps insertion order, the map points into it.
        let mut table: Vec<(String, f64)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for set in result_sets {
            for (rank, content) in set.iter().enumerate() {
                let content = content.as_ref();
                let term = 1.0 / (rank as f64 + self.k);

                match positions.get(content) {
                    Some(&idx) => table[idx].1 += term,
                    None => {
                        positions.insert(content.to_string(), table.len());
                        table.push((content.to_string(), term));
                    }
                }
            }
        }

        // Stable sort: equal scores stay in first-seen order.
        table.sort_by(|a, b| b.1.total_cmp(&a.1));
        table.truncate(top_k);
        table
    }
}

/// Fuse with an explicit constant.
pub fn reciprocal_rank_fusion<S: AsRef<str>>(
    result_sets: &[Vec<S>],
    top_k: usize,
    c: f64,
) -> AppResult<Vec<String>> {
    Ok(RrfFusion::new(c)?.fuse(result_sets, top_k))
}
