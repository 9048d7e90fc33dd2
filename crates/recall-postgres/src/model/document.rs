//! Document model for PostgreSQL database operations.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use recall_core::model as core;
use uuid::Uuid;

use crate::schema::documents;
use crate::types::DocumentStatus;

/// A row of `documents`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    pub id: Uuid,
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub file_name: String,
    /// Normalized parser output.
    pub content: String,
    /// SHA-256 of the content as of the last successful indexing run.
    pub content_hash: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub chunk_count: i32,
    pub char_count: i64,
    pub byte_size: i64,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub indexed_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
}

/// Data for creating a document.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocument {
    pub id: Uuid,
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub content: String,
    pub content_hash: String,
    pub status: DocumentStatus,
    pub char_count: i64,
    pub metadata: serde_json::Value,
}

/// Changeset written when an indexing run completes.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IndexedDocument {
    pub content_hash: String,
    pub status: DocumentStatus,
    /// `Some(None)` clears a previous failure message.
    pub error_message: Option<Option<String>>,
    pub chunk_count: i32,
    pub char_count: i64,
    pub byte_size: i64,
    pub indexed_at: Timestamp,
}

impl From<core::NewDocument> for NewDocument {
    fn from(new: core::NewDocument) -> Self {
        let document = new.into_document();
        Self {
            id: document.id,
            knowledge_base_id: document.knowledge_base_id,
            tenant_id: document.tenant_id,
            title: document.title,
            file_name: document.file_name,
            content: document.content,
            content_hash: document.content_hash,
            status: document.status.into(),
            char_count: document.char_count,
            metadata: document.metadata,
        }
    }
}

impl From<core::IndexingUpdate> for IndexedDocument {
    fn from(update: core::IndexingUpdate) -> Self {
        Self {
            content_hash: update.content_hash,
            status: DocumentStatus::Completed,
            error_message: Some(None),
            chunk_count: update.chunk_count,
            char_count: update.char_count,
            byte_size: update.byte_size,
            indexed_at: jiff::Timestamp::now().into(),
        }
    }
}

impl From<Document> for core::Document {
    fn from(row: Document) -> Self {
        Self {
            id: row.id,
            knowledge_base_id: row.knowledge_base_id,
            tenant_id: row.tenant_id,
            title: row.title,
            file_name: row.file_name,
            content: row.content,
            content_hash: row.content_hash,
            status: row.status.into(),
            error_message: row.error_message,
            chunk_count: row.chunk_count,
            char_count: row.char_count,
            byte_size: row.byte_size,
            metadata: row.metadata,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.into(),
            indexed_at: row.indexed_at.map(Into::into),
            deleted_at: row.deleted_at.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_pending_with_hash() {
        let new = NewDocument::from(core::NewDocument {
            knowledge_base_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            title: "Guide".into(),
            file_name: "guide.md".into(),
            content: "Ownership rules.".into(),
            metadata: serde_json::json!({}),
        });

        assert_eq!(new.status, DocumentStatus::Pending);
        assert_eq!(new.content_hash, core::content_hash("Ownership rules."));
        assert_eq!(new.char_count, 16);
    }

    #[test]
    fn test_indexing_update_clears_error() {
        let changes = IndexedDocument::from(core::IndexingUpdate {
            content_hash: core::content_hash("x"),
            chunk_count: 3,
            char_count: 1,
            byte_size: 1,
        });

        assert_eq!(changes.status, DocumentStatus::Completed);
        assert_eq!(changes.error_message, Some(None));
    }
}
