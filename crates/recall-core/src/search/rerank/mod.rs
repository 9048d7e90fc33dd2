//! Second-pass candidate reordering.

mod cross_encoder;
mod keyword;

use async_trait::async_trait;
pub use cross_encoder::{CrossEncoderConfig, CrossEncoderReranker};
pub use keyword::{IDEAL_MAX_TOKENS, IDEAL_MIN_TOKENS, KeywordReranker, RerankWeights};

use crate::Result;
use crate::model::SearchResult;

/// Reorders search candidates by a more precise relevance signal.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns `results` rescored and reordered, limited to `top_k`.
    async fn rerank(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
