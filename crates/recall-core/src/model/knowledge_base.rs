//! Knowledge base model.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle status of a knowledge base.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KnowledgeBaseStatus {
    /// Accepts uploads and queries.
    #[default]
    Active,
    /// Temporarily closed for uploads and queries.
    Disabled,
}

/// Tenant-scoped container of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Default embedding model for documents in this knowledge base.
    pub embedding_model: String,
    pub status: KnowledgeBaseStatus,
    pub document_count: i64,
    pub chunk_count: i64,
    pub total_bytes: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl KnowledgeBase {
    /// Creates a new active knowledge base with zeroed counters.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            name: name.into(),
            embedding_model: embedding_model.into(),
            status: KnowledgeBaseStatus::Active,
            document_count: 0,
            chunk_count: 0,
            total_bytes: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns whether the knowledge base was soft-deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns whether the knowledge base can serve uploads and queries.
    #[inline]
    pub fn is_available(&self) -> bool {
        !self.is_deleted() && self.status == KnowledgeBaseStatus::Active
    }

    /// Applies a counter delta, clamping each counter at zero.
    pub fn apply_delta(&mut self, delta: CounterDelta) {
        self.document_count = (self.document_count + delta.documents).max(0);
        self.chunk_count = (self.chunk_count + delta.chunks).max(0);
        self.total_bytes = (self.total_bytes + delta.bytes).max(0);
    }
}

/// Signed change to the running counters of a knowledge base.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub documents: i64,
    pub chunks: i64,
    pub bytes: i64,
}

impl CounterDelta {
    /// Returns whether the delta changes nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents == 0 && self.chunks == 0 && self.bytes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        let mut kb = KnowledgeBase::new(Uuid::nil(), "docs", "text-embedding-3-small");
        kb.apply_delta(CounterDelta {
            documents: 1,
            chunks: 4,
            bytes: 120,
        });
        kb.apply_delta(CounterDelta {
            documents: -2,
            chunks: -1,
            bytes: -20,
        });

        assert_eq!(kb.document_count, 0);
        assert_eq!(kb.chunk_count, 3);
        assert_eq!(kb.total_bytes, 100);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(KnowledgeBaseStatus::Active.to_string(), "active");
        assert_eq!(
            "disabled".parse::<KnowledgeBaseStatus>().ok(),
            Some(KnowledgeBaseStatus::Disabled)
        );
    }
}
