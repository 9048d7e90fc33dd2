//! Request and response types of the retrieval pipelines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::SearchResult;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// A single-knowledge-base search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub knowledge_base_id: Uuid,
    pub query: String,
    /// Number of results to return.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Fuse vector results with keyword results.
    #[serde(default)]
    pub hybrid: bool,
    /// Rerank the candidates before returning.
    #[serde(default)]
    pub rerank: bool,
    /// Results kept after reranking; defaults to `top_k`.
    #[serde(default)]
    pub rerank_top_k: Option<usize>,
    /// Drop results whose final score is below this value.
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl SearchRequest {
    /// Creates a vector-only search with default options.
    pub fn new(knowledge_base_id: Uuid, query: impl Into<String>) -> Self {
        Self {
            knowledge_base_id,
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            hybrid: false,
            rerank: false,
            rerank_top_k: None,
            score_threshold: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    #[must_use]
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    #[must_use]
    pub fn with_rerank_top_k(mut self, rerank_top_k: usize) -> Self {
        self.rerank_top_k = Some(rerank_top_k);
        self
    }

    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Number of results kept after reranking.
    #[inline]
    pub fn effective_rerank_top_k(&self) -> usize {
        self.rerank_top_k.unwrap_or(self.top_k)
    }
}

/// Results of a single-knowledge-base search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub top_k: usize,
    pub knowledge_base_id: Uuid,
    pub knowledge_base_name: String,
    pub results: Vec<SearchResult>,
}

/// A raw file to ingest into a knowledge base.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub metadata: serde_json::Value,
}

impl UploadRequest {
    /// Creates an upload titled after the file name.
    pub fn new(
        knowledge_base_id: Uuid,
        tenant_id: Uuid,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            knowledge_base_id,
            tenant_id,
            title: file_name.clone(),
            file_name,
            bytes: bytes.into(),
            metadata: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "knowledge_base_id": Uuid::nil(),
            "query": "rust",
        }))
        .unwrap();
        assert_eq!(request, SearchRequest::new(Uuid::nil(), "rust"));
        assert_eq!(request.effective_rerank_top_k(), 5);
        assert_eq!(request.with_rerank_top_k(2).effective_rerank_top_k(), 2);
    }
}
