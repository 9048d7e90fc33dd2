//! Document queries.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::now;
use crate::model::{Document, IndexedDocument, NewDocument};
use crate::types::DocumentStatus;
use crate::{PgConnection, PgError, PgResult, schema};

/// Statements over `documents`.
pub trait DocumentQueries {
    /// Inserts a document.
    fn create_document(
        &mut self,
        new_document: NewDocument,
    ) -> impl Future<Output = PgResult<Document>> + Send;

    /// Finds a document by id, including soft-deleted ones.
    fn find_document_by_id(
        &mut self,
        document_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<Document>>> + Send;

    /// Lists the live documents of a knowledge base, oldest first.
    fn list_knowledge_base_documents(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> impl Future<Output = PgResult<Vec<Document>>> + Send;

    /// Sets the status and replaces the error message.
    fn update_document_status(
        &mut self,
        document_id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> impl Future<Output = PgResult<()>> + Send;

    /// Records a completed indexing run.
    fn record_document_indexing(
        &mut self,
        document_id: Uuid,
        changes: IndexedDocument,
    ) -> impl Future<Output = PgResult<()>> + Send;

    /// Bumps `updated_at`.
    fn touch_document(&mut self, document_id: Uuid) -> impl Future<Output = PgResult<()>> + Send;

    /// Sets `deleted_at` on a live document.
    fn soft_delete_document(
        &mut self,
        document_id: Uuid,
    ) -> impl Future<Output = PgResult<()>> + Send;
}

impl DocumentQueries for PgConnection {
    async fn create_document(&mut self, new_document: NewDocument) -> PgResult<Document> {
        use schema::documents;

        let document = diesel::insert_into(documents::table)
            .values(&new_document)
            .returning(Document::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(document)
    }

    async fn find_document_by_id(&mut self, document_id: Uuid) -> PgResult<Option<Document>> {
        use schema::documents::{self, dsl};

        let document = documents::table
            .filter(dsl::id.eq(document_id))
            .select(Document::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(document)
    }

    async fn list_knowledge_base_documents(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> PgResult<Vec<Document>> {
        use schema::documents::{self, dsl};

        let documents = documents::table
            .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
            .filter(dsl::deleted_at.is_null())
            .order((dsl::created_at.asc(), dsl::id.asc()))
            .select(Document::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(documents)
    }

    async fn update_document_status(
        &mut self,
        document_id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> PgResult<()> {
        use schema::documents::{self, dsl};

        diesel::update(documents::table.filter(dsl::id.eq(document_id)))
            .set((dsl::status.eq(status), dsl::error_message.eq(error_message)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn record_document_indexing(
        &mut self,
        document_id: Uuid,
        changes: IndexedDocument,
    ) -> PgResult<()> {
        use schema::documents::{self, dsl};

        diesel::update(documents::table.filter(dsl::id.eq(document_id)))
            .set(&changes)
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn touch_document(&mut self, document_id: Uuid) -> PgResult<()> {
        use schema::documents::{self, dsl};

        diesel::update(documents::table.filter(dsl::id.eq(document_id)))
            .set(dsl::updated_at.eq(now()))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn soft_delete_document(&mut self, document_id: Uuid) -> PgResult<()> {
        use schema::documents::{self, dsl};

        diesel::update(
            documents::table
                .filter(dsl::id.eq(document_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::deleted_at.eq(Some(now())))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(())
    }
}
