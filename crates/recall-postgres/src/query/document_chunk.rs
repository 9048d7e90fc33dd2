//! Document chunk queries: writes, soft deletes, similarity and full-text search.

use std::future::Future;

use diesel::dsl::{count_distinct, count_star};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Text, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use pgvector::Vector;
use uuid::Uuid;

use super::now;
use crate::model::{DocumentChunk, NewDocumentChunk, ScoredDocumentChunk};
use crate::{PgConnection, PgError, PgResult, schema};

/// Live chunk totals of a knowledge base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentChunkStats {
    pub chunks: i64,
    pub documents: i64,
}

/// Statements over `document_chunks`.
///
/// Every read filters out soft-deleted rows.
pub trait DocumentChunkQueries {
    /// Creates the `vector` extension when it is missing.
    fn ensure_vector_extension(&mut self) -> impl Future<Output = PgResult<()>> + Send;

    /// Inserts chunks in one statement, returning the number written.
    fn create_document_chunks(
        &mut self,
        new_chunks: Vec<NewDocumentChunk>,
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Nearest live chunks by cosine distance, scored `1 - distance`.
    fn search_scored_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        query_embedding: Vector,
        limit: i64,
    ) -> impl Future<Output = PgResult<Vec<ScoredDocumentChunk>>> + Send;

    /// Live chunks matching any of `terms`, scored by `ts_rank`.
    fn search_ranked_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        terms: &[String],
        limit: i64,
    ) -> impl Future<Output = PgResult<Vec<ScoredDocumentChunk>>> + Send;

    /// Lists the live chunks of a document ordered by chunk index.
    fn list_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> impl Future<Output = PgResult<Vec<DocumentChunk>>> + Send;

    /// Sets the chunk index of live chunks, given as `(chunk id, index)`.
    fn renumber_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        updates: &[(Uuid, i32)],
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Soft-deletes chunks by id.
    fn soft_delete_document_chunks(
        &mut self,
        chunk_ids: &[Uuid],
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Soft-deletes every chunk of a document.
    fn soft_delete_document_chunks_by_document(
        &mut self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Soft-deletes every chunk of a knowledge base.
    fn soft_delete_document_chunks_by_knowledge_base(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Counts live chunks and distinct documents.
    fn count_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> impl Future<Output = PgResult<DocumentChunkStats>> + Send;
}

/// Full-text search row: chunk columns plus the rank.
#[derive(QueryableByName)]
struct RankedDocumentChunk {
    #[diesel(embed)]
    chunk: DocumentChunk,
    #[diesel(sql_type = Double)]
    score: f64,
}

/// Builds an OR `tsquery` from alphanumeric terms.
fn or_tsquery(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| term.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

impl DocumentChunkQueries for PgConnection {
    async fn ensure_vector_extension(&mut self) -> PgResult<()> {
        diesel::sql_query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn create_document_chunks(&mut self, new_chunks: Vec<NewDocumentChunk>) -> PgResult<usize> {
        use schema::document_chunks;

        if new_chunks.is_empty() {
            return Ok(0);
        }

        let written = diesel::insert_into(document_chunks::table)
            .values(&new_chunks)
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(written)
    }

    async fn search_scored_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        query_embedding: Vector,
        limit: i64,
    ) -> PgResult<Vec<ScoredDocumentChunk>> {
        use pgvector::VectorExpressionMethods;
        use schema::document_chunks::{self, dsl};

        let chunks: Vec<(DocumentChunk, f64)> = document_chunks::table
            .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
            .filter(dsl::deleted_at.is_null())
            .order(dsl::embedding.cosine_distance(&query_embedding))
            .limit(limit)
            .select((
                DocumentChunk::as_select(),
                (1.0.into_sql::<Double>() - dsl::embedding.cosine_distance(&query_embedding)),
            ))
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(chunks
            .into_iter()
            .map(|(chunk, score)| ScoredDocumentChunk { chunk, score })
            .collect())
    }

    async fn search_ranked_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        terms: &[String],
        limit: i64,
    ) -> PgResult<Vec<ScoredDocumentChunk>> {
        let tsquery = or_tsquery(terms);
        if tsquery.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<RankedDocumentChunk> = diesel::sql_query(
            "SELECT id, document_id, knowledge_base_id, tenant_id, chunk_index, content, \
                    content_hash, token_count, start_offset, end_offset, embedding_model, \
                    embedding_provider, metadata, created_at, updated_at, deleted_at, \
                    ts_rank(to_tsvector('simple', content), to_tsquery('simple', $2))::float8 AS score \
             FROM document_chunks \
             WHERE knowledge_base_id = $1 \
               AND deleted_at IS NULL \
               AND to_tsvector('simple', content) @@ to_tsquery('simple', $2) \
             ORDER BY score DESC, chunk_index ASC \
             LIMIT $3",
        )
        .bind::<SqlUuid, _>(knowledge_base_id)
        .bind::<Text, _>(tsquery)
        .bind::<BigInt, _>(limit)
        .load(self)
        .await
        .map_err(PgError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredDocumentChunk {
                chunk: row.chunk,
                score: row.score,
            })
            .collect())
    }

    async fn list_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> PgResult<Vec<DocumentChunk>> {
        use schema::document_chunks::{self, dsl};

        let chunks = document_chunks::table
            .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
            .filter(dsl::document_id.eq(document_id))
            .filter(dsl::deleted_at.is_null())
            .order(dsl::chunk_index.asc())
            .select(DocumentChunk::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(chunks)
    }

    async fn renumber_document_chunks(
        &mut self,
        knowledge_base_id: Uuid,
        updates: &[(Uuid, i32)],
    ) -> PgResult<usize> {
        use schema::document_chunks::{self, dsl};

        let mut affected = 0;
        for &(chunk_id, chunk_index) in updates {
            affected += diesel::update(
                document_chunks::table
                    .filter(dsl::id.eq(chunk_id))
                    .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
                    .filter(dsl::deleted_at.is_null()),
            )
            .set(dsl::chunk_index.eq(chunk_index))
            .execute(self)
            .await
            .map_err(PgError::from)?;
        }

        Ok(affected)
    }

    async fn soft_delete_document_chunks(&mut self, chunk_ids: &[Uuid]) -> PgResult<usize> {
        use schema::document_chunks::{self, dsl};

        if chunk_ids.is_empty() {
            return Ok(0);
        }

        let affected = diesel::update(
            document_chunks::table
                .filter(dsl::id.eq_any(chunk_ids))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::deleted_at.eq(Some(now())))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(affected)
    }

    async fn soft_delete_document_chunks_by_document(
        &mut self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> PgResult<usize> {
        use schema::document_chunks::{self, dsl};

        let affected = diesel::update(
            document_chunks::table
                .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
                .filter(dsl::document_id.eq(document_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::deleted_at.eq(Some(now())))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(affected)
    }

    async fn soft_delete_document_chunks_by_knowledge_base(
        &mut self,
        knowledge_base_id: Uuid,
    ) -> PgResult<usize> {
        use schema::document_chunks::{self, dsl};

        let affected = diesel::update(
            document_chunks::table
                .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::deleted_at.eq(Some(now())))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(affected)
    }

    async fn count_document_chunks(&mut self, knowledge_base_id: Uuid) -> PgResult<DocumentChunkStats> {
        use schema::document_chunks::{self, dsl};

        let (chunks, documents): (i64, i64) = document_chunks::table
            .filter(dsl::knowledge_base_id.eq(knowledge_base_id))
            .filter(dsl::deleted_at.is_null())
            .select((count_star(), count_distinct(dsl::document_id)))
            .first(self)
            .await
            .map_err(PgError::from)?;

        Ok(DocumentChunkStats { chunks, documents })
    }
}
