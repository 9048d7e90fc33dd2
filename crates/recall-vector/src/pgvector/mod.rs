//! pgvector backend over the `document_chunks` table.

use async_trait::async_trait;
use pgvector::Vector as PgVector;
use recall_core::model::{ChunkRecord, SearchResult, Vector, VectorStats};
use recall_core::search::{KeywordSearcher, tokenize};
use recall_core::store::VectorStore;
use recall_postgres::model::NewDocumentChunk;
use recall_postgres::query::DocumentChunkQueries;
use recall_postgres::{PgClient, PgConn, PgConnection, PgError, PgResult};
use uuid::Uuid;

use crate::{TRACING_TARGET_PGVECTOR, VectorError, VectorResult};

/// Maximum rows per insert statement.
const INSERT_BATCH_SIZE: usize = 500;

/// [`VectorStore`] backed by PostgreSQL with the pgvector extension.
///
/// Deletes are soft: rows get a `deleted_at` timestamp and drop out of every
/// read. Similarity is `1 - cosine_distance`, computed in the database.
#[derive(Debug, Clone)]
pub struct PgVectorStore {
    client: PgClient,
    dimensions: Option<usize>,
}

impl PgVectorStore {
    /// Creates the store, making sure the `vector` extension exists.
    pub async fn new(client: PgClient) -> VectorResult<Self> {
        let store = Self {
            client,
            dimensions: None,
        };

        let mut conn = store.connection("initialize").await?;
        conn.ensure_vector_extension()
            .await
            .map_err(VectorError::database("initialize"))?;

        tracing::info!(target: TRACING_TARGET_PGVECTOR, "pgvector store ready");
        Ok(store)
    }

    /// Rejects writes whose embedding length is not `dimensions`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Returns the configured embedding dimension, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn connection(&self, operation: &'static str) -> VectorResult<PgConn> {
        self.client
            .get_connection()
            .await
            .map_err(VectorError::database(operation))
    }

    fn check_dimensions(&self, vectors: &[Vector]) -> VectorResult<()> {
        let Some(expected) = self.dimensions else {
            return Ok(());
        };

        match vectors.iter().find(|v| v.dimensions() != expected) {
            Some(bad) => Err(VectorError::dimension_mismatch(expected, bad.dimensions())),
            None => Ok(()),
        }
    }

    fn check_query(&self, query: &[f32]) -> VectorResult<()> {
        match self.dimensions {
            Some(expected) if query.len() != expected => {
                Err(VectorError::dimension_mismatch(expected, query.len()))
            }
            _ => Ok(()),
        }
    }
}

fn limit(top_k: usize) -> i64 {
    i64::try_from(top_k).unwrap_or(i64::MAX)
}

/// Inserts rows in batches; the caller owns the transaction.
async fn insert_batches(conn: &mut PgConnection, rows: Vec<NewDocumentChunk>) -> PgResult<usize> {
    let mut written = 0;
    for batch in rows.chunks(INSERT_BATCH_SIZE) {
        written += conn.create_document_chunks(batch.to_vec()).await?;
    }
    Ok(written)
}

#[async_trait]
impl VectorStore for PgVectorStore {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_PGVECTOR, fields(count = vectors.len()))]
    async fn add_vectors(&self, vectors: Vec<Vector>) -> recall_core::Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        self.check_dimensions(&vectors)?;

        let mut conn = self.connection("insert").await?;
        let rows: Vec<NewDocumentChunk> = vectors.into_iter().map(Into::into).collect();

        let written = conn
            .transaction(|conn| Box::pin(async move { insert_batches(conn, rows).await }))
            .await
            .map_err(VectorError::database("insert"))?;

        tracing::debug!(target: TRACING_TARGET_PGVECTOR, written, "Inserted document chunks");
        Ok(())
    }

    #[tracing::instrument(
        skip(self, vectors),
        target = TRACING_TARGET_PGVECTOR,
        fields(count = vectors.len())
    )]
    async fn replace_document_vectors(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
        vectors: Vec<Vector>,
    ) -> recall_core::Result<()> {
        self.check_dimensions(&vectors)?;

        let mut conn = self.connection("replace").await?;
        let rows: Vec<NewDocumentChunk> = vectors.into_iter().map(Into::into).collect();

        let (deleted, written) = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let deleted = conn
                        .soft_delete_document_chunks_by_document(knowledge_base_id, document_id)
                        .await?;
                    let written = insert_batches(conn, rows).await?;
                    Ok::<(usize, usize), PgError>((deleted, written))
                })
            })
            .await
            .map_err(VectorError::database("replace"))?;

        tracing::debug!(
            target: TRACING_TARGET_PGVECTOR,
            deleted,
            written,
            "Replaced document chunks"
        );
        Ok(())
    }

    async fn renumber_chunks(&self, knowledge_base_id: Uuid, updates: &[(Uuid, i32)]) -> recall_core::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection("renumber").await?;
        let updates = updates.to_vec();
        let renumbered = conn
            .transaction(|conn| {
                Box::pin(async move { conn.renumber_document_chunks(knowledge_base_id, &updates).await })
            })
            .await
            .map_err(VectorError::database("renumber"))?;

        tracing::debug!(target: TRACING_TARGET_PGVECTOR, renumbered, "Renumbered document chunks");
        Ok(())
    }

    #[tracing::instrument(skip(self, query), target = TRACING_TARGET_PGVECTOR)]
    async fn search(
        &self,
        knowledge_base_id: Uuid,
        query: &[f32],
        top_k: usize,
    ) -> recall_core::Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        self.check_query(query)?;

        let mut conn = self.connection("search").await?;
        let chunks = conn
            .search_scored_document_chunks(knowledge_base_id, PgVector::from(query.to_vec()), limit(top_k))
            .await
            .map_err(VectorError::database("search"))?;

        tracing::debug!(target: TRACING_TARGET_PGVECTOR, results = chunks.len(), "Vector search completed");
        Ok(chunks.into_iter().map(|c| c.into_search_result()).collect())
    }

    async fn delete_vectors(&self, chunk_ids: &[Uuid]) -> recall_core::Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection("delete").await?;
        let deleted = conn
            .soft_delete_document_chunks(chunk_ids)
            .await
            .map_err(VectorError::database("delete"))?;

        tracing::debug!(target: TRACING_TARGET_PGVECTOR, deleted, "Soft-deleted chunks by id");
        Ok(())
    }

    async fn delete_by_document(&self, knowledge_base_id: Uuid, document_id: Uuid) -> recall_core::Result<()> {
        let mut conn = self.connection("delete").await?;
        let deleted = conn
            .soft_delete_document_chunks_by_document(knowledge_base_id, document_id)
            .await
            .map_err(VectorError::database("delete"))?;

        tracing::debug!(
            target: TRACING_TARGET_PGVECTOR,
            document_id = %document_id,
            deleted,
            "Soft-deleted document chunks"
        );
        Ok(())
    }

    async fn delete_by_knowledge_base(&self, knowledge_base_id: Uuid) -> recall_core::Result<()> {
        let mut conn = self.connection("delete").await?;
        let deleted = conn
            .soft_delete_document_chunks_by_knowledge_base(knowledge_base_id)
            .await
            .map_err(VectorError::database("delete"))?;

        tracing::info!(
            target: TRACING_TARGET_PGVECTOR,
            knowledge_base_id = %knowledge_base_id,
            deleted,
            "Soft-deleted knowledge base chunks"
        );
        Ok(())
    }

    async fn get_stats(&self, knowledge_base_id: Uuid) -> recall_core::Result<VectorStats> {
        let mut conn = self.connection("stats").await?;
        let stats = conn
            .count_document_chunks(knowledge_base_id)
            .await
            .map_err(VectorError::database("stats"))?;

        Ok(VectorStats {
            total_vectors: stats.chunks.max(0) as u64,
            total_documents: stats.documents.max(0) as u64,
        })
    }

    async fn list_document_chunks(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> recall_core::Result<Vec<ChunkRecord>> {
        let mut conn = self.connection("list").await?;
        let chunks = conn
            .list_document_chunks(knowledge_base_id, document_id)
            .await
            .map_err(VectorError::database("list"))?;

        Ok(chunks.into_iter().map(|c| c.into_record()).collect())
    }

    fn backend_name(&self) -> &str {
        "pgvector"
    }
}

#[async_trait]
impl KeywordSearcher for PgVectorStore {
    #[tracing::instrument(skip(self, query), target = TRACING_TARGET_PGVECTOR)]
    async fn keyword_search(
        &self,
        knowledge_base_id: Uuid,
        query: &str,
        top_k: usize,
    ) -> recall_core::Result<Vec<SearchResult>> {
        let terms = tokenize(query);
        if terms.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut conn = self.connection("keyword search").await?;
        let chunks = conn
            .search_ranked_document_chunks(knowledge_base_id, &terms, limit(top_k))
            .await
            .map_err(VectorError::database("keyword search"))?;

        Ok(chunks
            .into_iter()
            .map(|c| c.into_search_result().into_keyword_match())
            .collect())
    }
}
