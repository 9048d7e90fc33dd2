use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ChunkChange, ChunkDiff, diff_chunks};
use crate::embedding::embed_batch_cancellable;
use crate::model::{CounterDelta, Document, DocumentStatus, IndexingUpdate, Vector, content_hash};
use crate::retrieval::RetrievalService;
use crate::{Error, Result, TRACING_TARGET_INDEXER};

/// Kind of change reported for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
    /// Content changed; re-embed the chunks that moved.
    ContentUpdate,
    /// Only metadata changed; nothing to re-embed.
    MetadataUpdate,
    /// The document is gone; remove its vectors.
    Delete,
}

/// Outcome of re-indexing one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSync {
    pub unchanged: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Unchanged chunks given a new chunk index.
    #[serde(default)]
    pub moved: usize,
}

impl From<&ChunkDiff> for DocumentSync {
    fn from(diff: &ChunkDiff) -> Self {
        Self {
            unchanged: diff.unchanged,
            added: diff.added(),
            updated: diff.updated(),
            deleted: diff.deleted(),
            moved: diff.moved(),
        }
    }
}

/// A document that could not be re-indexed during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDocument {
    pub document_id: Uuid,
    pub error: String,
}

/// Summary of [`IncrementalIndexer::sync_knowledge_base`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub knowledge_base_id: Uuid,
    /// Documents examined.
    pub documents: usize,
    /// Documents whose content hash had not moved.
    pub skipped: usize,
    /// Documents re-indexed.
    pub reindexed: usize,
    pub chunks: DocumentSync,
    pub failed: Vec<FailedDocument>,
}

/// Keeps stored vectors consistent with changed documents.
///
/// Only chunks whose content hash moved are re-embedded; an update is a
/// delete of the old vector followed by an insert, never an in-place patch.
#[derive(Debug, Clone)]
pub struct IncrementalIndexer {
    service: RetrievalService,
}

impl IncrementalIndexer {
    /// Creates an indexer sharing the collaborators of `service`.
    pub fn new(service: RetrievalService) -> Self {
        Self { service }
    }

    /// Re-indexes every document of a knowledge base whose content drifted
    /// from the last indexed hash.
    ///
    /// Per-document failures are recorded in the report; cancellation aborts
    /// the sync between documents.
    #[tracing::instrument(skip(self, cancel), target = TRACING_TARGET_INDEXER)]
    pub async fn sync_knowledge_base(
        &self,
        knowledge_base_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let kb = self.service.require_knowledge_base(knowledge_base_id).await?;
        let documents = self.service.deps().documents.list_documents(kb.id).await?;

        let mut report = SyncReport {
            knowledge_base_id: kb.id,
            documents: documents.len(),
            ..SyncReport::default()
        };

        for document in documents {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !document.has_drifted() {
                report.skipped += 1;
                continue;
            }

            match self.reindex(&document, cancel).await {
                Ok(sync) => {
                    report.reindexed += 1;
                    report.chunks.unchanged += sync.unchanged;
                    report.chunks.added += sync.added;
                    report.chunks.updated += sync.updated;
                    report.chunks.deleted += sync.deleted;
                    report.chunks.moved += sync.moved;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => report.failed.push(FailedDocument {
                    document_id: document.id,
                    error: err.to_string(),
                }),
            }
        }

        tracing::info!(
            target: TRACING_TARGET_INDEXER,
            knowledge_base_id = %kb.id,
            documents = report.documents,
            skipped = report.skipped,
            reindexed = report.reindexed,
            failed = report.failed.len(),
            "Knowledge base sync completed"
        );
        Ok(report)
    }

    /// Applies one change notification for a document.
    #[tracing::instrument(skip(self, cancel), target = TRACING_TARGET_INDEXER)]
    pub async fn apply_change(
        &self,
        document_id: Uuid,
        change: ChangeType,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match change {
            ChangeType::ContentUpdate => {
                self.handle_content_update(document_id, cancel).await?;
            }
            ChangeType::MetadataUpdate => {
                self.service.deps().documents.touch_document(document_id).await?;
            }
            ChangeType::Delete => {
                let document = self
                    .service
                    .deps()
                    .documents
                    .find_document(document_id)
                    .await?
                    .ok_or(Error::DocumentNotFound(document_id))?;

                if document.is_deleted() {
                    self.service
                        .deps()
                        .store
                        .delete_by_document(document.knowledge_base_id, document.id)
                        .await?;
                } else {
                    self.service.delete_document(document.id).await?;
                }
            }
        }
        Ok(())
    }

    /// Re-indexes one document from its current content.
    pub async fn handle_content_update(
        &self,
        document_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<DocumentSync> {
        let document = self.service.require_document(document_id).await?;
        self.reindex(&document, cancel).await
    }

    async fn reindex(&self, document: &Document, cancel: &CancellationToken) -> Result<DocumentSync> {
        match self.apply_diff(document, cancel).await {
            Ok(sync) => Ok(sync),
            Err(err) => {
                if !matches!(err, Error::Cancelled) {
                    tracing::warn!(
                        target: TRACING_TARGET_INDEXER,
                        document_id = %document.id,
                        error = %err,
                        "Incremental re-index failed"
                    );
                    if let Err(status_err) = self
                        .service
                        .deps()
                        .documents
                        .update_document_status(
                            document.id,
                            DocumentStatus::Failed,
                            Some(err.to_string()),
                        )
                        .await
                    {
                        tracing::error!(
                            target: TRACING_TARGET_INDEXER,
                            document_id = %document.id,
                            error = %status_err,
                            "Failed to record document status"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn apply_diff(&self, document: &Document, cancel: &CancellationToken) -> Result<DocumentSync> {
        let deps = self.service.deps();
        let kb = self
            .service
            .require_knowledge_base(document.knowledge_base_id)
            .await?;

        let existing = deps.store.list_document_chunks(kb.id, document.id).await?;
        let chunks = deps.chunker.chunk_document(&document.content)?;
        let diff = diff_chunks(&existing, &chunks);

        let mut stale = Vec::new();
        let mut moves = Vec::new();
        let mut pending = Vec::new();
        for change in &diff.changes {
            match change {
                ChunkChange::Delete { id } => stale.push(*id),
                ChunkChange::Update { old_id, chunk } => {
                    stale.push(*old_id);
                    pending.push(chunk);
                }
                ChunkChange::Add { chunk } => pending.push(chunk),
                ChunkChange::Move { id, chunk_index } => moves.push((*id, *chunk_index)),
            }
        }

        // Embed before touching the store so a failed batch leaves it as it was.
        let mut vectors = Vec::with_capacity(pending.len());
        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|c| c.content.clone()).collect();
            let embeddings = embed_batch_cancellable(deps.embedder.as_ref(), &texts, cancel).await?;

            let model = deps.embedder.model();
            let provider = deps.embedder.provider_name();
            vectors.extend(
                pending
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| Vector::from_chunk(document, chunk, embedding, model, provider)),
            );
        }

        if !stale.is_empty() {
            deps.store.delete_vectors(&stale).await?;
        }
        if !moves.is_empty() {
            deps.store.renumber_chunks(kb.id, &moves).await?;
        }
        if !vectors.is_empty() {
            deps.store.add_vectors(vectors).await?;
        }

        let update = IndexingUpdate {
            content_hash: content_hash(&document.content),
            chunk_count: chunks.len() as i32,
            char_count: document.content.chars().count() as i64,
            byte_size: document.content.len() as i64,
        };
        let delta = CounterDelta {
            documents: i64::from(document.indexed_at.is_none()),
            chunks: i64::from(update.chunk_count) - i64::from(document.chunk_count),
            bytes: update.byte_size - document.byte_size,
        };
        deps.documents.record_indexing(document.id, update).await?;
        self.service.adjust_counters(kb.id, delta).await;

        let sync = DocumentSync::from(&diff);
        tracing::debug!(
            target: TRACING_TARGET_INDEXER,
            document_id = %document.id,
            unchanged = sync.unchanged,
            added = sync.added,
            updated = sync.updated,
            deleted = sync.deleted,
            moved = sync.moved,
            "Document re-indexed"
        );
        Ok(sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{DocumentRepository, KnowledgeBaseRepository};
    use crate::retrieval::SearchRequest;
    use crate::retrieval::service::tests::{SENTENCES, fixture, ingest};
    use crate::store::VectorStore;

    const EDITED: &str = "Rust guarantees memory safety without a garbage collector. \
        Lifetimes describe how long every reference stays valid. \
        Cargo builds the project and fetches its dependencies.";

    const TRIMMED: &str = "Rust guarantees memory safety without a garbage collector. \
        Cargo builds the project and fetches its dependencies.";

    #[tokio::test]
    async fn test_sync_reembeds_only_changed_chunks() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        let indexer = IncrementalIndexer::new(fx.service.clone());
        let cancel = CancellationToken::new();

        let before = fx.store.list_document_chunks(fx.kb.id, document.id).await.unwrap();
        assert_eq!(before.len(), 3);

        let report = indexer.sync_knowledge_base(fx.kb.id, &cancel).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.reindexed, 0);

        fx.repo.update_document_content(document.id, EDITED).await.unwrap();
        let report = indexer.sync_knowledge_base(fx.kb.id, &cancel).await.unwrap();
        assert_eq!(report.reindexed, 1);
        assert_eq!(
            report.chunks,
            DocumentSync {
                unchanged: 2,
                added: 0,
                updated: 1,
                deleted: 0,
                moved: 0,
            }
        );

        let after = fx.store.list_document_chunks(fx.kb.id, document.id).await.unwrap();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].id, before[0].id);
        assert_ne!(after[1].id, before[1].id);
        assert_eq!(after[2].id, before[2].id);
        assert!(after[1].content.starts_with("Lifetimes"));

        let response = fx
            .service
            .search(&SearchRequest::new(fx.kb.id, "lifetimes").with_top_k(1))
            .await
            .unwrap();
        assert!(response.results[0].content.starts_with("Lifetimes"));

        let stored = fx.repo.find_document(document.id).await.unwrap().unwrap();
        assert!(!stored.has_drifted());
        assert_eq!(stored.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_removed_sentence_deletes_one_vector() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        let indexer = IncrementalIndexer::new(fx.service.clone());

        fx.repo.update_document_content(document.id, TRIMMED).await.unwrap();
        let sync = indexer
            .handle_content_update(document.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sync.deleted, 1);
        assert_eq!(sync.added, 0);
        assert_eq!(sync.updated, 0);

        let stats = fx.store.get_stats(fx.kb.id).await.unwrap();
        assert_eq!(stats.total_vectors, 2);
        let kb = fx.repo.find_knowledge_base(fx.kb.id).await.unwrap().unwrap();
        assert_eq!(kb.chunk_count, 2);
    }

    #[tokio::test]
    async fn test_prepended_sentence_shifts_chunk_indexes() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        let indexer = IncrementalIndexer::new(fx.service.clone());
        let before = fx.store.list_document_chunks(fx.kb.id, document.id).await.unwrap();

        let prepended = format!("Tokio drives async tasks on a thread pool. {SENTENCES}");
        fx.repo.update_document_content(document.id, prepended).await.unwrap();
        let sync = indexer
            .handle_content_update(document.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sync.unchanged, 3);
        assert_eq!(sync.added, 1);
        assert_eq!(sync.moved, 3);

        let after = fx.store.list_document_chunks(fx.kb.id, document.id).await.unwrap();
        let indexes: Vec<i32> = after.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert!(after[0].content.starts_with("Tokio"));
        assert!(after[1].content.starts_with("Rust"));
        assert!(after[3].content.starts_with("Cargo"));
        assert_eq!(after[1].id, before[0].id);

        // A second pass over the same content finds nothing to do.
        let sync = indexer
            .handle_content_update(document.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sync.unchanged, 4);
        assert_eq!(sync.added + sync.updated + sync.deleted + sync.moved, 0);
    }

    #[tokio::test]
    async fn test_metadata_update_and_delete_changes() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        let indexer = IncrementalIndexer::new(fx.service.clone());
        let cancel = CancellationToken::new();

        let before = fx.repo.find_document(document.id).await.unwrap().unwrap();
        indexer
            .apply_change(document.id, ChangeType::MetadataUpdate, &cancel)
            .await
            .unwrap();
        let after = fx.repo.find_document(document.id).await.unwrap().unwrap();
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.content_hash, before.content_hash);
        assert_eq!(fx.store.get_stats(fx.kb.id).await.unwrap().total_vectors, 3);

        indexer
            .apply_change(document.id, ChangeType::Delete, &cancel)
            .await
            .unwrap();
        assert_eq!(fx.store.get_stats(fx.kb.id).await.unwrap().total_vectors, 0);
        assert!(fx.repo.find_document(document.id).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_cancelled_sync() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        fx.repo.update_document_content(document.id, EDITED).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let indexer = IncrementalIndexer::new(fx.service.clone());
        assert!(matches!(
            indexer.sync_knowledge_base(fx.kb.id, &cancel).await,
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_change_type_names() {
        assert_eq!(ChangeType::MetadataUpdate.to_string(), "metadata_update");
        assert_eq!("delete".parse::<ChangeType>().unwrap(), ChangeType::Delete);
    }
}
