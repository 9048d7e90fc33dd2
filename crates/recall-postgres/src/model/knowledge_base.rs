//! Knowledge base model for PostgreSQL database operations.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use recall_core::model as core;
use uuid::Uuid;

use crate::schema::knowledge_bases;
use crate::types::KnowledgeBaseStatus;

/// A row of `knowledge_bases`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = knowledge_bases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KnowledgeBase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub embedding_model: String,
    pub status: KnowledgeBaseStatus,
    /// Live documents.
    pub document_count: i64,
    /// Live chunks across all documents.
    pub chunk_count: i64,
    /// Total size of indexed document content in bytes.
    pub total_bytes: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// Data for creating a knowledge base.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = knowledge_bases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewKnowledgeBase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub embedding_model: String,
    pub status: KnowledgeBaseStatus,
}

impl NewKnowledgeBase {
    /// Creates an active knowledge base with a fresh id.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            name: name.into(),
            embedding_model: embedding_model.into(),
            status: KnowledgeBaseStatus::Active,
        }
    }
}

impl From<KnowledgeBase> for core::KnowledgeBase {
    fn from(row: KnowledgeBase) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            embedding_model: row.embedding_model,
            status: row.status.into(),
            document_count: row.document_count,
            chunk_count: row.chunk_count,
            total_bytes: row.total_bytes,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.into(),
            deleted_at: row.deleted_at.map(Into::into),
        }
    }
}
