//! Document model and processing states.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Processing status of a document.
///
/// Documents move `pending → processing → completed | failed`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    /// Uploaded and waiting in the queue.
    #[default]
    Pending,
    /// Chunking and embedding in flight.
    Processing,
    /// Vectors written and statistics updated.
    Completed,
    /// Processing aborted; the document carries an error message.
    Failed,
}

impl DocumentStatus {
    /// Returns whether the status is terminal.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

/// A source unit inside a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub file_name: String,
    /// Normalized raw text produced by the parser.
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

impl Document {
    /// Returns whether the document was soft-deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns whether the stored content differs from what was last indexed.
    ///
    /// A document that was never indexed always counts as drifted.
    pub fn has_drifted(&self) -> bool {
        self.indexed_at.is_none() || super::content_hash(&self.content) != self.content_hash
    }
}

/// Data for creating a new document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub knowledge_base_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl NewDocument {
    /// Builds the persisted form with a fresh id and `pending` status.
    pub fn into_document(self) -> Document {
        let now = Timestamp::now();
        let content_hash = super::content_hash(&self.content);
        Document {
            id: Uuid::now_v7(),
            knowledge_base_id: self.knowledge_base_id,
            tenant_id: self.tenant_id,
            title: self.title,
            file_name: self.file_name,
            char_count: self.content.chars().count() as i64,
            content: self.content,
            content_hash,
            status: DocumentStatus::Pending,
            error_message: None,
            chunk_count: 0,
            byte_size: 0,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            indexed_at: None,
            deleted_at: None,
        }
    }
}

/// Result of a successful indexing run, persisted on the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingUpdate {
    pub content_hash: String,
    pub chunk_count: i32,
    pub char_count: i64,
    pub byte_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_document(content: &str) -> Document {
        NewDocument {
            knowledge_base_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            title: "notes".into(),
            file_name: "notes.txt".into(),
            content: content.into(),
            metadata: serde_json::Value::Null,
        }
        .into_document()
    }

    #[test]
    fn test_new_document_is_pending() {
        let doc = new_document("Hello world.");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.char_count, 12);
        assert!(doc.indexed_at.is_none());
    }

    #[test]
    fn test_drift_detection() {
        let mut doc = new_document("Hello world.");
        assert!(doc.has_drifted());

        doc.indexed_at = Some(Timestamp::now());
        assert!(!doc.has_drifted());

        doc.content = "Hello there.".into();
        assert!(doc.has_drifted());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&DocumentStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
    }
}
