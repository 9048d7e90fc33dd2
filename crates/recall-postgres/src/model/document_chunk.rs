//! Document chunk model for PostgreSQL database operations.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use pgvector::Vector;
use recall_core::model::{self as core, ChunkRecord, SearchResult};
use uuid::Uuid;

use crate::schema::document_chunks;

/// A row of `document_chunks` without its embedding.
///
/// The embedding column is write-only from the application's point of view;
/// similarity is computed in the database.
#[derive(Debug, Clone, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = document_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    /// Zero-based position within the document.
    pub chunk_index: i32,
    pub content: String,
    /// SHA-256 of the chunk content.
    pub content_hash: String,
    pub token_count: i32,
    pub start_offset: i32,
    pub end_offset: i32,
    pub embedding_model: String,
    pub embedding_provider: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// Data for creating a document chunk.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = document_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocumentChunk {
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
    pub embedding: Vector,
    pub embedding_model: String,
    pub embedding_provider: String,
    pub metadata: serde_json::Value,
}

/// A document chunk with its similarity or rank score.
#[derive(Debug, Clone)]
pub struct ScoredDocumentChunk {
    pub chunk: DocumentChunk,
    /// Higher is more relevant.
    pub score: f64,
}

impl DocumentChunk {
    /// Returns the listing form used for chunk diffing.
    pub fn into_record(self) -> ChunkRecord {
        ChunkRecord {
            id: self.id,
            document_id: self.document_id,
            chunk_index: self.chunk_index,
            content_hash: self.content_hash,
            content: self.content,
        }
    }
}

impl ScoredDocumentChunk {
    /// Converts into an engine search result scored with `score`.
    pub fn into_search_result(self) -> SearchResult {
        let chunk = self.chunk;
        SearchResult::new(
            chunk.id,
            chunk.document_id,
            chunk.knowledge_base_id,
            chunk.content,
            self.score as f32,
        )
        .with_chunk_index(chunk.chunk_index)
        .with_metadata(chunk.metadata)
    }
}

impl From<core::Vector> for NewDocumentChunk {
    fn from(vector: core::Vector) -> Self {
        Self {
            id: vector.id,
            document_id: vector.document_id,
            knowledge_base_id: vector.knowledge_base_id,
            tenant_id: vector.tenant_id,
            chunk_index: vector.chunk_index,
            content: vector.content,
            content_hash: vector.content_hash,
            token_count: vector.token_count,
            start_offset: vector.start_offset,
            end_offset: vector.end_offset,
            embedding: Vector::from(vector.embedding),
            embedding_model: vector.embedding_model,
            embedding_provider: vector.embedding_provider,
            metadata: if vector.metadata.is_null() {
                serde_json::json!({})
            } else {
                vector.metadata
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_metadata_is_stored_as_empty_object() {
        let vector = core::Vector {
            id: Uuid::nil(),
            document_id: Uuid::nil(),
            knowledge_base_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            chunk_index: 2,
            content: "Borrowing rules.".into(),
            content_hash: core::content_hash("Borrowing rules."),
            token_count: 3,
            start_offset: 10,
            end_offset: 26,
            embedding: vec![0.1, 0.2, 0.3],
            embedding_model: "hashing".into(),
            embedding_provider: "local".into(),
            metadata: serde_json::Value::Null,
        };

        let row = NewDocumentChunk::from(vector);
        assert_eq!(row.metadata, serde_json::json!({}));
        assert_eq!(row.embedding.as_slice(), &[0.1, 0.2, 0.3]);
        assert_eq!(row.chunk_index, 2);
    }
}
