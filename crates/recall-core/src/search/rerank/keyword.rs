//! Local reranker combining keyword, position and length signals.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Reranker;
use crate::Result;
use crate::chunker::estimate_tokens;
use crate::model::{SearchResult, sort_by_score_desc};
use crate::search::tokenize;

/// Lower bound of the ideal chunk length, in tokens.
pub const IDEAL_MIN_TOKENS: usize = 50;

/// Upper bound of the ideal chunk length, in tokens.
pub const IDEAL_MAX_TOKENS: usize = 500;

/// Signal weights for [`KeywordReranker`].
///
/// The final score is `original * score + (1 - original) * relevance`, where
/// relevance is the `keyword`, `position` and `length` weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankWeights {
    pub original: f32,
    pub keyword: f32,
    pub position: f32,
    pub length: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            original: 0.3,
            keyword: 0.6,
            position: 0.3,
            length: 0.1,
        }
    }
}

/// Default reranker. Needs no external service.
#[derive(Debug, Clone, Default)]
pub struct KeywordReranker {
    weights: RerankWeights,
}

impl KeywordReranker {
    /// Creates a reranker with default weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reranker with custom weights.
    pub fn with_weights(weights: RerankWeights) -> Self {
        Self { weights }
    }

    /// Scores one candidate against the tokenized query.
    pub fn score(&self, query_tokens: &[String], result: &SearchResult) -> f32 {
        let doc_tokens = tokenize(&result.content);
        let w = self.weights;

        let relevance = w.keyword * keyword_score(query_tokens, &doc_tokens)
            + w.position * position_score(query_tokens, &doc_tokens)
            + w.length * length_score(estimate_tokens(&result.content));

        w.original * result.score + (1.0 - w.original) * relevance
    }

    /// Rescores and reorders candidates synchronously.
    pub fn rerank_sync(
        &self,
        query: &str,
        mut results: Vec<SearchResult>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let query_tokens = tokenize(query);
        for result in &mut results {
            result.score = self.score(&query_tokens, result);
        }
        sort_by_score_desc(&mut results);
        results.truncate(top_k);
        results
    }
}

#[async_trait]
impl Reranker for KeywordReranker {
    async fn rerank(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.rerank_sync(query, results, top_k))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Jaccard overlap blended evenly with a log-scaled term-frequency score.
fn keyword_score(query: &[String], doc: &[String]) -> f32 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }

    let query_set: HashSet<&str> = query.iter().map(String::as_str).collect();
    let doc_set: HashSet<&str> = doc.iter().map(String::as_str).collect();
    let intersection = query_set.intersection(&doc_set).count() as f32;
    let union = query_set.union(&doc_set).count() as f32;
    let jaccard = intersection / union;

    let norm = (1.0 + doc.len() as f32).ln();
    let tf = query_set
        .iter()
        .map(|term| {
            let count = doc.iter().filter(|t| t.as_str() == *term).count() as f32;
            (1.0 + count).ln() / norm
        })
        .sum::<f32>()
        / query_set.len() as f32;

    0.5 * jaccard + 0.5 * tf.min(1.0)
}

/// `e^(-2 * p)` where `p` is the relative position of the earliest query-term hit.
fn position_score(query: &[String], doc: &[String]) -> f32 {
    if doc.is_empty() {
        return 0.0;
    }

    let query_set: HashSet<&str> = query.iter().map(String::as_str).collect();
    doc.iter()
        .position(|t| query_set.contains(t.as_str()))
        .map(|pos| (-2.0 * pos as f32 / doc.len() as f32).exp())
        .unwrap_or(0.0)
}

/// 1.0 inside the ideal window, scaling linearly toward zero outside it.
fn length_score(tokens: usize) -> f32 {
    if tokens < IDEAL_MIN_TOKENS {
        tokens as f32 / IDEAL_MIN_TOKENS as f32
    } else if tokens > IDEAL_MAX_TOKENS {
        let over = (tokens - IDEAL_MAX_TOKENS) as f32 / IDEAL_MAX_TOKENS as f32;
        (1.0 - over).max(0.0)
    } else {
        1.0
    }
}
