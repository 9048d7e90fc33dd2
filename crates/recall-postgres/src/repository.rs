//! `recall-core` repository implementations over [`PgClient`].

use async_trait::async_trait;
use recall_core::Result;
use recall_core::model::{
    CounterDelta, Document, DocumentStatus, IndexingUpdate, KnowledgeBase, NewDocument,
};
use recall_core::repository::{DocumentRepository, KnowledgeBaseRepository};
use uuid::Uuid;

use crate::query::{DocumentQueries, KnowledgeBaseQueries};
use crate::{PgClient, PgConn, TRACING_TARGET_QUERY};

impl PgClient {
    async fn connection_for(&self, operation: &str) -> Result<PgConn> {
        self.get_connection()
            .await
            .map_err(|e| e.into_repository(operation))
    }
}

#[async_trait]
impl KnowledgeBaseRepository for PgClient {
    async fn find_knowledge_base(&self, id: Uuid) -> Result<Option<KnowledgeBase>> {
        const OP: &str = "find knowledge base";
        let mut conn = self.connection_for(OP).await?;
        let knowledge_base = conn
            .find_knowledge_base_by_id(id)
            .await
            .map_err(|e| e.into_repository(OP))?;
        Ok(knowledge_base.map(Into::into))
    }

    async fn soft_delete_knowledge_base(&self, id: Uuid) -> Result<()> {
        const OP: &str = "delete knowledge base";
        let mut conn = self.connection_for(OP).await?;
        conn.soft_delete_knowledge_base(id)
            .await
            .map_err(|e| e.into_repository(OP))?;

        tracing::info!(target: TRACING_TARGET_QUERY, knowledge_base_id = %id, "Knowledge base soft-deleted");
        Ok(())
    }

    async fn adjust_knowledge_base_counters(&self, id: Uuid, delta: CounterDelta) -> Result<()> {
        const OP: &str = "adjust knowledge base counters";
        if delta.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection_for(OP).await?;
        conn.adjust_knowledge_base_counters(id, delta.documents, delta.chunks, delta.bytes)
            .await
            .map_err(|e| e.into_repository(OP))
    }
}

#[async_trait]
impl DocumentRepository for PgClient {
    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        const OP: &str = "create document";
        let mut conn = self.connection_for(OP).await?;
        let document = conn
            .create_document(document.into())
            .await
            .map_err(|e| e.into_repository(OP))?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            document_id = %document.id,
            knowledge_base_id = %document.knowledge_base_id,
            "Document created"
        );
        Ok(document.into())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        const OP: &str = "find document";
        let mut conn = self.connection_for(OP).await?;
        let document = conn
            .find_document_by_id(id)
            .await
            .map_err(|e| e.into_repository(OP))?;
        Ok(document.map(Into::into))
    }

    async fn list_documents(&self, knowledge_base_id: Uuid) -> Result<Vec<Document>> {
        const OP: &str = "list documents";
        let mut conn = self.connection_for(OP).await?;
        let documents = conn
            .list_knowledge_base_documents(knowledge_base_id)
            .await
            .map_err(|e| e.into_repository(OP))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        const OP: &str = "update document status";
        let mut conn = self.connection_for(OP).await?;
        conn.update_document_status(id, status.into(), error_message)
            .await
            .map_err(|e| e.into_repository(OP))
    }

    async fn record_indexing(&self, id: Uuid, update: IndexingUpdate) -> Result<()> {
        const OP: &str = "record indexing";
        let mut conn = self.connection_for(OP).await?;
        conn.record_document_indexing(id, update.into())
            .await
            .map_err(|e| e.into_repository(OP))
    }

    async fn touch_document(&self, id: Uuid) -> Result<()> {
        const OP: &str = "touch document";
        let mut conn = self.connection_for(OP).await?;
        conn.touch_document(id)
            .await
            .map_err(|e| e.into_repository(OP))
    }

    async fn soft_delete_document(&self, id: Uuid) -> Result<()> {
        const OP: &str = "delete document";
        let mut conn = self.connection_for(OP).await?;
        conn.soft_delete_document(id)
            .await
            .map_err(|e| e.into_repository(OP))
    }
}
