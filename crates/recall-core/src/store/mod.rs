//! Vector store abstraction.

mod memory;

use async_trait::async_trait;
pub use memory::MemoryVectorStore;
use uuid::Uuid;

use crate::Result;
use crate::model::{ChunkRecord, SearchResult, Vector, VectorStats};

/// Persists chunk embeddings and answers nearest-neighbour queries.
///
/// Every operation is scoped by knowledge base. Deleted chunks are excluded
/// from search, listing and statistics. Scores follow one convention across
/// backends: cosine similarity, higher is more similar.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes a batch of vectors.
    async fn add_vectors(&self, vectors: Vec<Vector>) -> Result<()>;

    /// Returns the `top_k` live chunks of a knowledge base closest to `query`.
    async fn search(
        &self,
        knowledge_base_id: Uuid,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Replaces every chunk of a document with `vectors`.
    ///
    /// Backends that can should apply the delete and the insert atomically;
    /// the default deletes first and then writes.
    async fn replace_document_vectors(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
        vectors: Vec<Vector>,
    ) -> Result<()> {
        self.delete_by_document(knowledge_base_id, document_id).await?;
        self.add_vectors(vectors).await
    }

    /// Moves live chunks to new chunk indexes, given as `(chunk id, index)`.
    async fn renumber_chunks(&self, knowledge_base_id: Uuid, updates: &[(Uuid, i32)]) -> Result<()>;

    /// Deletes chunks by id.
    async fn delete_vectors(&self, chunk_ids: &[Uuid]) -> Result<()>;

    /// Deletes every chunk of a document.
    async fn delete_by_document(&self, knowledge_base_id: Uuid, document_id: Uuid) -> Result<()>;

    /// Deletes every chunk of a knowledge base.
    async fn delete_by_knowledge_base(&self, knowledge_base_id: Uuid) -> Result<()>;

    /// Counts live chunks and the distinct documents they belong to.
    async fn get_stats(&self, knowledge_base_id: Uuid) -> Result<VectorStats>;

    /// Lists the live chunks of a document ordered by chunk index.
    async fn list_document_chunks(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<ChunkRecord>>;

    /// Backend name used in logs.
    fn backend_name(&self) -> &str;
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
