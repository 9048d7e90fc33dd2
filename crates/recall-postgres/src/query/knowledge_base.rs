//! Knowledge base queries.

use std::future::Future;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::now;
use crate::model::{KnowledgeBase, NewKnowledgeBase};
use crate::{PgConnection, PgError, PgResult, schema};

/// Statements over `knowledge_bases`.
pub trait KnowledgeBaseQueries {
    /// Inserts a knowledge base.
    fn create_knowledge_base(
        &mut self,
        new_knowledge_base: NewKnowledgeBase,
    ) -> impl Future<Output = PgResult<KnowledgeBase>> + Send;

    /// Finds a knowledge base by id, including soft-deleted ones.
    fn find_knowledge_base_by_id(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<KnowledgeBase>>> + Send;

    /// Lists the live knowledge bases of a tenant, newest first.
    fn list_tenant_knowledge_bases(
        &mut self,
        tenant_id: Uuid,
    ) -> impl Future<Output = PgResult<Vec<KnowledgeBase>>> + Send;

    /// Sets `deleted_at` on a live knowledge base.
    fn soft_delete_knowledge_base(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> impl Future<Output = PgResult<()>> + Send;

    /// Adds signed deltas to the counters, clamping each at zero.
    fn adjust_knowledge_base_counters(
        &mut self,
        knowledge_base_id: Uuid,
        documents: i64,
        chunks: i64,
        bytes: i64,
    ) -> impl Future<Output = PgResult<()>> + Send;
}

impl KnowledgeBaseQueries for PgConnection {
    async fn create_knowledge_base(
        &mut self,
        new_knowledge_base: NewKnowledgeBase,
    ) -> PgResult<KnowledgeBase> {
        use schema::knowledge_bases;

        let knowledge_base = diesel::insert_into(knowledge_bases::table)
            .values(&new_knowledge_base)
            .returning(KnowledgeBase::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(knowledge_base)
    }

    async fn find_knowledge_base_by_id(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> PgResult<Option<KnowledgeBase>> {
        use schema::knowledge_bases::{self, dsl};

        let knowledge_base = knowledge_bases::table
            .filter(dsl::id.eq(knowledge_base_id))
            .select(KnowledgeBase::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(knowledge_base)
    }

    async fn list_tenant_knowledge_bases(&mut self, tenant_id: Uuid) -> PgResult<Vec<KnowledgeBase>> {
        use schema::knowledge_bases::{self, dsl};

        let knowledge_bases = knowledge_bases::table
            .filter(dsl::tenant_id.eq(tenant_id))
            .filter(dsl::deleted_at.is_null())
            .order(dsl::created_at.desc())
            .select(KnowledgeBase::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(knowledge_bases)
    }

    async fn soft_delete_knowledge_base(&mut self, knowledge_base_id: Uuid) -> PgResult<()> {
        use schema::knowledge_bases::{self, dsl};

        diesel::update(
            knowledge_bases::table
                .filter(dsl::id.eq(knowledge_base_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::deleted_at.eq(Some(now())))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(())
    }

    async fn adjust_knowledge_base_counters(
        &mut self,
        knowledge_base_id: Uuid,
        documents: i64,
        chunks: i64,
        bytes: i64,
    ) -> PgResult<()> {
        diesel::sql_query(
            "UPDATE knowledge_bases SET \
                document_count = GREATEST(document_count + $1, 0), \
                chunk_count = GREATEST(chunk_count + $2, 0), \
                total_bytes = GREATEST(total_bytes + $3, 0) \
             WHERE id = $4",
        )
        .bind::<BigInt, _>(documents)
        .bind::<BigInt, _>(chunks)
        .bind::<BigInt, _>(bytes)
        .bind::<SqlUuid, _>(knowledge_base_id)
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(())
    }
}
