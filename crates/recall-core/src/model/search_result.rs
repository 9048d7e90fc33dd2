//! Query results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single retrieved chunk.
///
/// `score` is the operative ranking value and is rewritten by fusion,
/// weighting and reranking. `similarity` keeps the original vector similarity
/// for diagnostics; it is zero for hits that came only from keyword search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub knowledge_base_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_name: Option<String>,
    pub chunk_index: i32,
    pub content: String,
    pub score: f32,
    pub similarity: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SearchResult {
    /// Creates a result whose score and similarity start out equal.
    pub fn new(
        chunk_id: Uuid,
        document_id: Uuid,
        knowledge_base_id: Uuid,
        content: impl Into<String>,
        similarity: f32,
    ) -> Self {
        Self {
            chunk_id,
            document_id,
            knowledge_base_id,
            knowledge_base_name: None,
            chunk_index: 0,
            content: content.into(),
            score: similarity,
            similarity,
            metadata: serde_json::Value::Null,
        }
    }

    /// Sets the chunk index.
    pub fn with_chunk_index(mut self, chunk_index: i32) -> Self {
        self.chunk_index = chunk_index;
        self
    }

    /// Sets the metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the result as a keyword match: the score stays, similarity is zero.
    pub fn into_keyword_match(mut self) -> Self {
        self.similarity = 0.0;
        self
    }
}

/// Sorts results by descending score, keeping the relative order of ties.
pub(crate) fn sort_by_score_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}
