//! Relational persistence contracts for knowledge bases and documents.
//!
//! `recall-postgres` implements these over diesel; [`MemoryRepository`] is the
//! in-process implementation used by tests and single-node tooling.

mod memory;

use async_trait::async_trait;
pub use memory::MemoryRepository;
use uuid::Uuid;

use crate::Result;
use crate::model::{
    CounterDelta, Document, DocumentStatus, IndexingUpdate, KnowledgeBase, NewDocument,
};

/// Knowledge-base lookups and bookkeeping.
#[async_trait]
pub trait KnowledgeBaseRepository: Send + Sync {
    /// Finds a knowledge base by id, including soft-deleted ones.
    async fn find_knowledge_base(&self, id: Uuid) -> Result<Option<KnowledgeBase>>;

    /// Marks a knowledge base deleted.
    async fn soft_delete_knowledge_base(&self, id: Uuid) -> Result<()>;

    /// Adds signed deltas to the document, chunk and byte counters.
    async fn adjust_knowledge_base_counters(&self, id: Uuid, delta: CounterDelta) -> Result<()>;
}

/// Document lifecycle persistence.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Inserts a new `pending` document.
    async fn create_document(&self, document: NewDocument) -> Result<Document>;

    /// Finds a document by id, including soft-deleted ones.
    async fn find_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Lists the live documents of a knowledge base, oldest first.
    async fn list_documents(&self, knowledge_base_id: Uuid) -> Result<Vec<Document>>;

    /// Sets the processing status, replacing the error message.
    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<()>;

    /// Marks a document `completed` with the statistics of a finished run.
    async fn record_indexing(&self, id: Uuid, update: IndexingUpdate) -> Result<()>;

    /// Bumps `updated_at` without touching anything else.
    async fn touch_document(&self, id: Uuid) -> Result<()>;

    /// Marks a document deleted.
    async fn soft_delete_document(&self, id: Uuid) -> Result<()>;
}
