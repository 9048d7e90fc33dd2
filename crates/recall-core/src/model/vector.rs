//! Stored chunk vectors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::chunker::Chunk;

/// A chunk of a document together with its embedding.
///
/// Vectors are created, replaced and deleted only by the indexing pipeline.
/// The content hash, not the id, identifies a chunk when diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: Uuid,
    pub document_id: Uuid,
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub content_hash: String,
    pub token_count: i32,
    pub start_offset: i32,
    pub end_offset: i32,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub embedding_provider: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Vector {
    /// Builds the vector for one chunk of `document` with a fresh random id.
    pub fn from_chunk(
        document: &Document,
        chunk: &Chunk,
        embedding: Vec<f32>,
        embedding_model: &str,
        embedding_provider: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: document.id,
            knowledge_base_id: document.knowledge_base_id,
            tenant_id: document.tenant_id,
            chunk_index: chunk.index as i32,
            content: chunk.content.clone(),
            content_hash: chunk.content_hash.clone(),
            token_count: chunk.token_count as i32,
            start_offset: chunk.start_offset as i32,
            end_offset: chunk.end_offset as i32,
            embedding,
            embedding_model: embedding_model.to_owned(),
            embedding_provider: embedding_provider.to_owned(),
            metadata: serde_json::json!({
                "title": document.title,
                "file_name": document.file_name,
            }),
        }
    }

    /// Returns the embedding dimension.
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }

    /// Returns the listing form of this vector.
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            id: self.id,
            document_id: self.document_id,
            chunk_index: self.chunk_index,
            content_hash: self.content_hash.clone(),
            content: self.content.clone(),
        }
    }
}

/// A live chunk of a document without its embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content_hash: String,
    pub content: String,
}

/// Per knowledge base totals reported by a vector store.
///
/// Soft-deleted vectors are never counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStats {
    pub total_vectors: u64,
    pub total_documents: u64,
}
