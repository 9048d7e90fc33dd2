use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{VectorStore, cosine_similarity};
use crate::model::{ChunkRecord, SearchResult, Vector, VectorStats, sort_by_score_desc};
use crate::search::{KeywordSearcher, bm25_scores, tokenize};
use crate::{Error, Result, TRACING_TARGET_STORE};

struct StoredVector {
    vector: Vector,
    deleted_at: Option<Timestamp>,
}

impl StoredVector {
    fn is_live_in(&self, knowledge_base_id: Uuid) -> bool {
        self.deleted_at.is_none() && self.vector.knowledge_base_id == knowledge_base_id
    }

    fn to_result(&self, score: f32) -> SearchResult {
        let v = &self.vector;
        SearchResult::new(v.id, v.document_id, v.knowledge_base_id, v.content.clone(), score)
            .with_chunk_index(v.chunk_index)
            .with_metadata(v.metadata.clone())
    }
}

/// In-process [`VectorStore`] with exact cosine search and BM25 keyword search.
///
/// Deletion marks rows with a timestamp; nothing is physically removed.
#[derive(Default)]
pub struct MemoryVectorStore {
    dimensions: Option<usize>,
    rows: RwLock<Vec<StoredVector>>,
}

impl MemoryVectorStore {
    /// Creates a store accepting vectors of any length.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects vectors whose length is not `dimensions`.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            rows: RwLock::default(),
        }
    }

    /// Total rows held, including soft-deleted ones.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns whether the store holds no rows at all.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn mark_deleted(&self, predicate: impl Fn(&Vector) -> bool) -> usize {
        let now = Timestamp::now();
        let mut rows = self.rows.write().await;
        let mut count = 0;
        for row in rows.iter_mut().filter(|r| r.deleted_at.is_none()) {
            if predicate(&row.vector) {
                row.deleted_at = Some(now);
                count += 1;
            }
        }
        count
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add_vectors(&self, vectors: Vec<Vector>) -> Result<()> {
        if let Some(expected) = self.dimensions
            && let Some(bad) = vectors.iter().find(|v| v.dimensions() != expected)
        {
            return Err(Error::dimension_mismatch(expected, bad.dimensions()));
        }

        let count = vectors.len();
        let mut rows = self.rows.write().await;
        rows.extend(vectors.into_iter().map(|vector| StoredVector {
            vector,
            deleted_at: None,
        }));

        tracing::debug!(target: TRACING_TARGET_STORE, count, "Added vectors");
        Ok(())
    }

    async fn search(
        &self,
        knowledge_base_id: Uuid,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let rows = self.rows.read().await;
        let mut results: Vec<SearchResult> = rows
            .iter()
            .filter(|r| r.is_live_in(knowledge_base_id))
            .map(|r| r.to_result(cosine_similarity(query, &r.vector.embedding)))
            .collect();

        sort_by_score_desc(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn renumber_chunks(&self, knowledge_base_id: Uuid, updates: &[(Uuid, i32)]) -> Result<()> {
        let indexes: HashMap<Uuid, i32> = updates.iter().copied().collect();
        let mut rows = self.rows.write().await;
        let mut count = 0;
        for row in rows.iter_mut().filter(|r| r.is_live_in(knowledge_base_id)) {
            if let Some(&chunk_index) = indexes.get(&row.vector.id) {
                row.vector.chunk_index = chunk_index;
                count += 1;
            }
        }

        tracing::debug!(target: TRACING_TARGET_STORE, count, "Renumbered chunks");
        Ok(())
    }

    async fn delete_vectors(&self, chunk_ids: &[Uuid]) -> Result<()> {
        let ids: HashSet<&Uuid> = chunk_ids.iter().collect();
        let count = self.mark_deleted(|v| ids.contains(&v.id)).await;
        tracing::debug!(target: TRACING_TARGET_STORE, count, "Deleted vectors by id");
        Ok(())
    }

    async fn delete_by_document(&self, knowledge_base_id: Uuid, document_id: Uuid) -> Result<()> {
        let count = self
            .mark_deleted(|v| v.knowledge_base_id == knowledge_base_id && v.document_id == document_id)
            .await;
        tracing::debug!(
            target: TRACING_TARGET_STORE,
            document_id = %document_id,
            count,
            "Deleted document vectors"
        );
        Ok(())
    }

    async fn delete_by_knowledge_base(&self, knowledge_base_id: Uuid) -> Result<()> {
        let count = self
            .mark_deleted(|v| v.knowledge_base_id == knowledge_base_id)
            .await;
        tracing::debug!(
            target: TRACING_TARGET_STORE,
            knowledge_base_id = %knowledge_base_id,
            count,
            "Deleted knowledge base vectors"
        );
        Ok(())
    }

    async fn get_stats(&self, knowledge_base_id: Uuid) -> Result<VectorStats> {
        let rows = self.rows.read().await;
        let live: Vec<&StoredVector> = rows
            .iter()
            .filter(|r| r.is_live_in(knowledge_base_id))
            .collect();
        let documents: HashSet<Uuid> = live.iter().map(|r| r.vector.document_id).collect();

        Ok(VectorStats {
            total_vectors: live.len() as u64,
            total_documents: documents.len() as u64,
        })
    }

    async fn list_document_chunks(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<ChunkRecord>> {
        let rows = self.rows.read().await;
        let mut chunks: Vec<ChunkRecord> = rows
            .iter()
            .filter(|r| r.is_live_in(knowledge_base_id) && r.vector.document_id == document_id)
            .map(|r| r.vector.to_record())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl KeywordSearcher for MemoryVectorStore {
    async fn keyword_search(
        &self,
        knowledge_base_id: Uuid,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_tokens = tokenize(query);
        let rows = self.rows.read().await;
        let live: Vec<&StoredVector> = rows
            .iter()
            .filter(|r| r.is_live_in(knowledge_base_id))
            .collect();

        let corpus: Vec<Vec<String>> = live.iter().map(|r| tokenize(&r.vector.content)).collect();
        let scores = bm25_scores(&corpus, &query_tokens);

        let mut results: Vec<SearchResult> = live
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(row, score)| row.to_result(score).into_keyword_match())
            .collect();

        sort_by_score_desc(&mut results);
        results.truncate(top_k);
        Ok(results)
    }
}

impl std::fmt::Debug for MemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVectorStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(kb: Uuid, doc: Uuid, index: i32, content: &str, embedding: Vec<f32>) -> Vector {
        Vector {
            id: Uuid::new_v4(),
            document_id: doc,
            knowledge_base_id: kb,
            tenant_id: Uuid::nil(),
            chunk_index: index,
            content: content.to_owned(),
            content_hash: crate::model::content_hash(content),
            token_count: 0,
            start_offset: 0,
            end_offset: content.chars().count() as i32,
            embedding,
            embedding_model: "test".to_owned(),
            embedding_provider: "test".to_owned(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_search_is_scoped_and_ranked() {
        let store = MemoryVectorStore::new();
        let (kb, other_kb, doc) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .add_vectors(vec![
                vector(kb, doc, 0, "a", vec![1.0, 0.0]),
                vector(kb, doc, 1, "b", vec![0.6, 0.8]),
                vector(other_kb, doc, 0, "c", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(kb, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "a");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.6).abs() < 1e-6);
        assert_eq!(results[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_validation_error() {
        let store = MemoryVectorStore::with_dimensions(3);
        let err = store
            .add_vectors(vec![vector(Uuid::nil(), Uuid::nil(), 0, "x", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(!err.is_retryable());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_soft_delete_excluded_from_search_and_stats() {
        let store = MemoryVectorStore::new();
        let (kb, doc_a, doc_b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let first = vector(kb, doc_a, 0, "a0", vec![1.0, 0.0]);
        let first_id = first.id;
        store
            .add_vectors(vec![
                first,
                vector(kb, doc_a, 1, "a1", vec![1.0, 0.0]),
                vector(kb, doc_b, 0, "b0", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        store.delete_vectors(&[first_id]).await.unwrap();
        let stats = store.get_stats(kb).await.unwrap();
        assert_eq!(stats.total_vectors, 2);
        assert_eq!(stats.total_documents, 2);

        store.delete_by_document(kb, doc_b).await.unwrap();
        let stats = store.get_stats(kb).await.unwrap();
        assert_eq!(stats.total_vectors, 1);
        assert_eq!(stats.total_documents, 1);

        let results = store.search(kb, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "a1");

        store.delete_by_knowledge_base(kb).await.unwrap();
        assert_eq!(store.get_stats(kb).await.unwrap(), VectorStats::default());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_list_document_chunks_orders_by_index() {
        let store = MemoryVectorStore::new();
        let (kb, doc) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .add_vectors(vec![
                vector(kb, doc, 2, "c", vec![1.0]),
                vector(kb, doc, 0, "a", vec![1.0]),
                vector(kb, doc, 1, "b", vec![1.0]),
            ])
            .await
            .unwrap();

        let chunks = store.list_document_chunks(kb, doc).await.unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_keyword_search_bm25() {
        let store = MemoryVectorStore::new();
        let (kb, doc) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .add_vectors(vec![
                vector(kb, doc, 0, "Rust has zero cost abstractions.", vec![1.0]),
                vector(kb, doc, 1, "Python is dynamically typed.", vec![1.0]),
                vector(kb, doc, 2, "Rust and rust again.", vec![1.0]),
            ])
            .await
            .unwrap();

        let results = store.keyword_search(kb, "rust", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 2);
        assert!(results[0].score > 0.0);
        assert_eq!(results[0].similarity, 0.0);
        assert!(store.keyword_search(kb, "haskell", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_renumber_chunks() {
        let store = MemoryVectorStore::new();
        let (kb, other_kb, doc) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let a = vector(kb, doc, 0, "a", vec![1.0]);
        let b = vector(kb, doc, 1, "b", vec![1.0]);
        let foreign = vector(other_kb, doc, 0, "c", vec![1.0]);
        let (a_id, b_id, foreign_id) = (a.id, b.id, foreign.id);
        store.add_vectors(vec![a, b, foreign]).await.unwrap();

        store
            .renumber_chunks(kb, &[(a_id, 1), (b_id, 2), (foreign_id, 5)])
            .await
            .unwrap();

        let chunks = store.list_document_chunks(kb, doc).await.unwrap();
        let indexes: Vec<(i32, &str)> = chunks.iter().map(|c| (c.chunk_index, c.content.as_str())).collect();
        assert_eq!(indexes, vec![(1, "a"), (2, "b")]);
        assert_eq!(store.list_document_chunks(other_kb, doc).await.unwrap()[0].chunk_index, 0);
    }
}
