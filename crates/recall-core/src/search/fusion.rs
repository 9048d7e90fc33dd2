//! Reciprocal Rank Fusion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{SearchResult, sort_by_score_desc};

/// Default RRF rank constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Configuration for [`reciprocal_rank_fusion`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrfConfig {
    /// Rank constant added to every 1-based rank.
    pub k: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl RrfConfig {
    /// Creates a configuration with the given rank constant.
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Fuses ranked lists with this configuration.
    pub fn fuse(&self, lists: &[Vec<SearchResult>]) -> Vec<SearchResult> {
        reciprocal_rank_fusion(lists, self.k)
    }
}

/// Merges ranked result lists by Reciprocal Rank Fusion.
///
/// An item at zero-based `rank` in a list contributes `1 / (k + rank + 1)`;
/// contributions are summed per chunk id across lists. The fused score
/// replaces [`SearchResult::score`], while the remaining fields come from the
/// item's first occurrence. The output is stably sorted by descending score,
/// so ties keep first-seen order.
pub fn reciprocal_rank_fusion(lists: &[Vec<SearchResult>], k: f32) -> Vec<SearchResult> {
    let capacity = lists.iter().map(Vec::len).sum();
    let mut fused: Vec<SearchResult> = Vec::with_capacity(capacity);
    let mut positions: HashMap<Uuid, usize> = HashMap::with_capacity(capacity);

    for list in lists {
        for (rank, result) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            match positions.get(&result.chunk_id) {
                Some(&pos) => fused[pos].score += contribution,
                None => {
                    positions.insert(result.chunk_id, fused.len());
                    let mut entry = result.clone();
                    entry.score = contribution;
                    fused.push(entry);
                }
            }
        }
    }

    sort_by_score_desc(&mut fused);
    fused
}
