use crate::types::SearchHit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// RRF constant k (typically 60)
pub const DEFAULT_RRF_K: f32 = 60.0;

/// How per-index hit lists are combined into one ranking
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Raw similarity scores, highest first
    #[default]
    Score,
    /// Reciprocal Rank Fusion over each index's own ranking
    ReciprocalRank {
        #[serde(default = "default_rrf_k")]
        k: f32,
    },
}

const fn default_rrf_k() -> f32 {
    DEFAULT_RRF_K
}

impl MergeStrategy {
    #[must_use]
    pub const fn reciprocal_rank() -> Self {
        Self::ReciprocalRank { k: DEFAULT_RRF_K }
    }

    /// Merge per-index lists (given in index order) and keep the global `top_k`
    #[must_use]
    pub fn merge(self, per_index: Vec<Vec<SearchHit>>, top_k: usize) -> Vec<SearchHit> {
        let mut merged = match self {
            Self::Score => per_index.into_iter().flatten().collect(),
            Self::ReciprocalRank { k } => fuse_ranks(per_index, k),
        };
        // stable: equal scores keep index order, then rank order within an index
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(top_k);
        merged
    }
}

/// RRF formula: score(d) = Σ 1 / (k + rank_i(d))
///
/// Hits with identical text are one document; the first occurrence is kept.
fn fuse_ranks(per_index: Vec<Vec<SearchHit>>, k: f32) -> Vec<SearchHit> {
    let mut fused: Vec<SearchHit> = Vec::new();
    let mut by_text: HashMap<String, usize> = HashMap::new();

    for hits in per_index {
        for (rank, hit) in hits.into_iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            match by_text.get(&hit.text) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    by_text.insert(hit.text.clone(), fused.len());
                    fused.push(SearchHit {
                        score: contribution,
                        ..hit
                    });
                }
            }
        }
    }
    fused
}
