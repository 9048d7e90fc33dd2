use std::collections::HashMap;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentRepository, KnowledgeBaseRepository};
use crate::model::{
    CounterDelta, Document, DocumentStatus, IndexingUpdate, KnowledgeBase, NewDocument,
};
use crate::{Error, Result};

/// In-process repository for knowledge bases and documents.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    knowledge_bases: RwLock<HashMap<Uuid, KnowledgeBase>>,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a knowledge base.
    pub async fn insert_knowledge_base(&self, knowledge_base: KnowledgeBase) {
        self.knowledge_bases
            .write()
            .await
            .insert(knowledge_base.id, knowledge_base);
    }

    /// Replaces the stored content of a document, as an editor would.
    ///
    /// The indexed content hash is left alone so the change shows up as drift.
    pub async fn update_document_content(&self, id: Uuid, content: impl Into<String>) -> Result<()> {
        self.with_document(id, |doc| {
            doc.content = content.into();
            doc.char_count = doc.content.chars().count() as i64;
        })
        .await
    }

    async fn with_document(&self, id: Uuid, f: impl FnOnce(&mut Document)) -> Result<()> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&id)
            .filter(|d| !d.is_deleted())
            .ok_or(Error::DocumentNotFound(id))?;
        f(doc);
        doc.updated_at = Timestamp::now();
        Ok(())
    }
}

#[async_trait]
impl KnowledgeBaseRepository for MemoryRepository {
    async fn find_knowledge_base(&self, id: Uuid) -> Result<Option<KnowledgeBase>> {
        Ok(self.knowledge_bases.read().await.get(&id).cloned())
    }

    async fn soft_delete_knowledge_base(&self, id: Uuid) -> Result<()> {
        let mut knowledge_bases = self.knowledge_bases.write().await;
        let kb = knowledge_bases
            .get_mut(&id)
            .filter(|kb| !kb.is_deleted())
            .ok_or(Error::KnowledgeBaseNotFound(id))?;
        let now = Timestamp::now();
        kb.deleted_at = Some(now);
        kb.updated_at = now;
        Ok(())
    }

    async fn adjust_knowledge_base_counters(&self, id: Uuid, delta: CounterDelta) -> Result<()> {
        let mut knowledge_bases = self.knowledge_bases.write().await;
        let kb = knowledge_bases
            .get_mut(&id)
            .ok_or(Error::KnowledgeBaseNotFound(id))?;
        kb.apply_delta(delta);
        kb.updated_at = Timestamp::now();
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        let document = document.into_document();
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn list_documents(&self, knowledge_base_id: Uuid) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut listed: Vec<Document> = documents
            .values()
            .filter(|d| d.knowledge_base_id == knowledge_base_id && !d.is_deleted())
            .cloned()
            .collect();
        listed.sort_by_key(|d| (d.created_at, d.id));
        Ok(listed)
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        self.with_document(id, |doc| {
            doc.status = status;
            doc.error_message = error_message;
        })
        .await
    }

    async fn record_indexing(&self, id: Uuid, update: IndexingUpdate) -> Result<()> {
        self.with_document(id, |doc| {
            doc.status = DocumentStatus::Completed;
            doc.error_message = None;
            doc.content_hash = update.content_hash;
            doc.chunk_count = update.chunk_count;
            doc.char_count = update.char_count;
            doc.byte_size = update.byte_size;
            doc.indexed_at = Some(Timestamp::now());
        })
        .await
    }

    async fn touch_document(&self, id: Uuid) -> Result<()> {
        self.with_document(id, |_| {}).await
    }

    async fn soft_delete_document(&self, id: Uuid) -> Result<()> {
        self.with_document(id, |doc| doc.deleted_at = Some(Timestamp::now()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_document(kb: Uuid, content: &str) -> NewDocument {
        NewDocument {
            knowledge_base_id: kb,
            tenant_id: Uuid::nil(),
            title: "notes".to_owned(),
            file_name: "notes.txt".to_owned(),
            content: content.to_owned(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let repo = MemoryRepository::new();
        let kb = Uuid::new_v4();
        let doc = repo.create_document(new_document(kb, "hello")).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);

        repo.update_document_status(doc.id, DocumentStatus::Processing, None)
            .await
            .unwrap();
        repo.record_indexing(
            doc.id,
            IndexingUpdate {
                content_hash: doc.content_hash.clone(),
                chunk_count: 1,
                char_count: 5,
                byte_size: 5,
            },
        )
        .await
        .unwrap();

        let stored = repo.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert!(stored.indexed_at.is_some());
        assert!(!stored.has_drifted());

        repo.update_document_content(doc.id, "hello again").await.unwrap();
        let stored = repo.find_document(doc.id).await.unwrap().unwrap();
        assert!(stored.has_drifted());
    }

    #[tokio::test]
    async fn test_soft_deleted_documents_are_hidden() {
        let repo = MemoryRepository::new();
        let kb = Uuid::new_v4();
        let a = repo.create_document(new_document(kb, "a")).await.unwrap();
        repo.create_document(new_document(kb, "b")).await.unwrap();

        repo.soft_delete_document(a.id).await.unwrap();
        assert_eq!(repo.list_documents(kb).await.unwrap().len(), 1);
        assert!(repo.find_document(a.id).await.unwrap().unwrap().is_deleted());
        assert!(matches!(
            repo.touch_document(a.id).await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counters_never_go_negative() {
        let repo = MemoryRepository::new();
        let kb = KnowledgeBase::new(Uuid::nil(), "docs", "hashing-64");
        let id = kb.id;
        repo.insert_knowledge_base(kb).await;

        let delta = CounterDelta {
            documents: 1,
            chunks: 4,
            bytes: 100,
        };
        repo.adjust_knowledge_base_counters(id, delta).await.unwrap();
        repo.adjust_knowledge_base_counters(
            id,
            CounterDelta {
                documents: -2,
                chunks: -1,
                bytes: -10,
            },
        )
        .await
        .unwrap();

        let kb = repo.find_knowledge_base(id).await.unwrap().unwrap();
        assert_eq!(kb.document_count, 0);
        assert_eq!(kb.chunk_count, 3);
        assert_eq!(kb.total_bytes, 90);

        repo.soft_delete_knowledge_base(id).await.unwrap();
        assert!(!repo
            .find_knowledge_base(id)
            .await
            .unwrap()
            .unwrap()
            .is_available());
    }
}
