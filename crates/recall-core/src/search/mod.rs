//! Keyword search, rank fusion and reranking.

mod bm25;
mod fusion;
pub mod rerank;
mod tokenize;

use async_trait::async_trait;
pub use bm25::{BM25_B, BM25_K1, bm25_scores};
pub use fusion::{DEFAULT_RRF_K, RrfConfig, reciprocal_rank_fusion};
pub use rerank::{KeywordReranker, Reranker};
pub use tokenize::tokenize;
use uuid::Uuid;

use crate::Result;
use crate::model::SearchResult;

/// Full-text search over the live chunks of one knowledge base.
///
/// Results are ranked by the backend's own relevance score, highest first.
#[async_trait]
pub trait KeywordSearcher: Send + Sync {
    /// Returns at most `top_k` chunks of `knowledge_base_id` matching `query`.
    async fn keyword_search(
        &self,
        knowledge_base_id: Uuid,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
