use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{SearchRequest, SearchResponse, UploadRequest};
use crate::chunker::Chunker;
use crate::embedding::{EmbeddingProvider, embed_batch_cancellable};
use crate::model::{
    CounterDelta, Document, DocumentStatus, IndexingUpdate, KnowledgeBase, NewDocument,
    SearchResult, Vector, content_hash,
};
use crate::parser::ParserRegistry;
use crate::queue::DocumentQueue;
use crate::repository::{DocumentRepository, KnowledgeBaseRepository};
use crate::search::{KeywordSearcher, Reranker, RrfConfig};
use crate::store::VectorStore;
use crate::{Error, Result, TRACING_TARGET_RETRIEVAL};

/// Collaborators of a [`RetrievalService`].
///
/// Keyword search and reranking are optional; without them hybrid and rerank
/// requests fall back to plain vector search.
#[derive(Clone)]
pub struct RetrievalDeps {
    pub knowledge_bases: Arc<dyn KnowledgeBaseRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub queue: Arc<dyn DocumentQueue>,
    pub parsers: ParserRegistry,
    pub chunker: Chunker,
    pub keyword_searcher: Option<Arc<dyn KeywordSearcher>>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub rrf: RrfConfig,
}

impl RetrievalDeps {
    /// Creates the required collaborators with default parsers, chunker and RRF.
    pub fn new(
        knowledge_bases: Arc<dyn KnowledgeBaseRepository>,
        documents: Arc<dyn DocumentRepository>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        queue: Arc<dyn DocumentQueue>,
    ) -> Self {
        Self {
            knowledge_bases,
            documents,
            store,
            embedder,
            queue,
            parsers: ParserRegistry::with_defaults(),
            chunker: Chunker::default(),
            keyword_searcher: None,
            reranker: None,
            rrf: RrfConfig::default(),
        }
    }

    #[must_use]
    pub fn with_keyword_searcher(mut self, searcher: Arc<dyn KeywordSearcher>) -> Self {
        self.keyword_searcher = Some(searcher);
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    #[must_use]
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    #[must_use]
    pub fn with_rrf(mut self, rrf: RrfConfig) -> Self {
        self.rrf = rrf;
        self
    }
}

/// Orchestrates document upload, asynchronous processing and search.
///
/// Documents move `pending` → `processing` → `completed` or `failed`. The
/// service is cheap to clone and can be shared across tasks.
#[derive(Clone)]
pub struct RetrievalService {
    inner: Arc<RetrievalDeps>,
}

impl RetrievalService {
    /// Creates a service over the given collaborators.
    pub fn new(deps: RetrievalDeps) -> Self {
        Self {
            inner: Arc::new(deps),
        }
    }

    /// Returns the injected collaborators.
    pub fn deps(&self) -> &RetrievalDeps {
        &self.inner
    }

    /// Loads a knowledge base, failing if it is missing, deleted or disabled.
    pub async fn require_knowledge_base(&self, id: Uuid) -> Result<KnowledgeBase> {
        self.inner
            .knowledge_bases
            .find_knowledge_base(id)
            .await?
            .filter(KnowledgeBase::is_available)
            .ok_or(Error::KnowledgeBaseNotFound(id))
    }

    pub(crate) async fn require_document(&self, id: Uuid) -> Result<Document> {
        self.inner
            .documents
            .find_document(id)
            .await?
            .filter(|d| !d.is_deleted())
            .ok_or(Error::DocumentNotFound(id))
    }

    /// Parses and stores a file, then enqueues it for processing.
    ///
    /// Never waits for embedding. If the job cannot be enqueued the document
    /// is marked `failed` and the queue error is returned.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_RETRIEVAL,
        fields(knowledge_base_id = %request.knowledge_base_id, file_name = %request.file_name)
    )]
    pub async fn upload(&self, request: UploadRequest) -> Result<Document> {
        let kb = self.require_knowledge_base(request.knowledge_base_id).await?;
        if kb.tenant_id != request.tenant_id {
            return Err(Error::KnowledgeBaseNotFound(kb.id));
        }

        let content = self
            .inner
            .parsers
            .parse(&request.file_name, &mut request.bytes.as_slice())?;
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let document = self
            .inner
            .documents
            .create_document(NewDocument {
                knowledge_base_id: kb.id,
                tenant_id: kb.tenant_id,
                title: request.title,
                file_name: request.file_name,
                content,
                metadata: request.metadata,
            })
            .await?;

        if let Err(err) = self.inner.queue.enqueue_process_document(document.id).await {
            tracing::error!(
                target: TRACING_TARGET_RETRIEVAL,
                document_id = %document.id,
                error = %err,
                "Failed to enqueue document"
            );
            self.inner
                .documents
                .update_document_status(document.id, DocumentStatus::Failed, Some(err.to_string()))
                .await?;
            return Err(err);
        }

        tracing::info!(
            target: TRACING_TARGET_RETRIEVAL,
            document_id = %document.id,
            chars = document.char_count,
            "Document uploaded and enqueued"
        );
        Ok(document)
    }

    /// Chunks, embeds and stores a document, replacing any earlier vectors.
    ///
    /// On failure the document is marked `failed` with the error message and
    /// the error is returned so the queue can redeliver. A cancelled run puts
    /// the document back to `pending`.
    #[tracing::instrument(skip(self, cancel), target = TRACING_TARGET_RETRIEVAL)]
    pub async fn process_document(
        &self,
        document_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let document = self.require_document(document_id).await?;

        match self.index_document(&document, cancel).await {
            Ok(chunks) => {
                tracing::info!(
                    target: TRACING_TARGET_RETRIEVAL,
                    document_id = %document_id,
                    chunks,
                    "Document processed"
                );
                Ok(chunks)
            }
            Err(err) => {
                let (status, message) = match err {
                    Error::Cancelled => (DocumentStatus::Pending, None),
                    ref other => (DocumentStatus::Failed, Some(other.to_string())),
                };
                tracing::warn!(
                    target: TRACING_TARGET_RETRIEVAL,
                    document_id = %document_id,
                    error = %err,
                    status = %status,
                    "Document processing failed"
                );
                if let Err(status_err) = self
                    .inner
                    .documents
                    .update_document_status(document_id, status, message)
                    .await
                {
                    tracing::error!(
                        target: TRACING_TARGET_RETRIEVAL,
                        document_id = %document_id,
                        error = %status_err,
                        "Failed to record document status"
                    );
                }
                Err(err)
            }
        }
    }

    async fn index_document(&self, document: &Document, cancel: &CancellationToken) -> Result<usize> {
        let inner = &self.inner;
        let kb = self.require_knowledge_base(document.knowledge_base_id).await?;

        inner
            .documents
            .update_document_status(document.id, DocumentStatus::Processing, None)
            .await?;

        let chunks = inner.chunker.chunk_document(&document.content)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embed_batch_cancellable(inner.embedder.as_ref(), &texts, cancel).await?;

        let model = inner.embedder.model();
        let provider = inner.embedder.provider_name();
        let vectors: Vec<Vector> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Vector::from_chunk(document, chunk, embedding, model, provider))
            .collect();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Redelivered jobs must not duplicate chunks.
        inner
            .store
            .replace_document_vectors(kb.id, document.id, vectors)
            .await?;

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
        inner.documents.record_indexing(document.id, update).await?;
        self.adjust_counters(kb.id, delta).await;

        Ok(chunks.len())
    }

    /// Applies counter deltas; counters are informational, so failures only log.
    pub(crate) async fn adjust_counters(&self, knowledge_base_id: Uuid, delta: CounterDelta) {
        if delta.is_empty() {
            return;
        }
        if let Err(err) = self
            .inner
            .knowledge_bases
            .adjust_knowledge_base_counters(knowledge_base_id, delta)
            .await
        {
            tracing::warn!(
                target: TRACING_TARGET_RETRIEVAL,
                knowledge_base_id = %knowledge_base_id,
                error = %err,
                "Failed to adjust knowledge base counters"
            );
        }
    }

    /// Runs the search pipeline for one knowledge base.
    ///
    /// Vector search, then optional keyword fusion, optional rerank and the
    /// score threshold. Keyword and rerank failures are logged and skipped.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_RETRIEVAL,
        fields(knowledge_base_id = %request.knowledge_base_id, top_k = request.top_k)
    )]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let kb = self.require_knowledge_base(request.knowledge_base_id).await?;
        if request.query.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let inner = &self.inner;
        let query_vector = inner.embedder.embed(&request.query).await?;

        let hybrid = request.hybrid && inner.keyword_searcher.is_some();
        let candidates = if hybrid { request.top_k * 2 } else { request.top_k };
        let mut results = inner.store.search(kb.id, &query_vector, candidates).await?;

        if hybrid && let Some(searcher) = &inner.keyword_searcher {
            match searcher.keyword_search(kb.id, &request.query, candidates).await {
                Ok(keyword) => {
                    tracing::debug!(
                        target: TRACING_TARGET_RETRIEVAL,
                        vector = results.len(),
                        keyword = keyword.len(),
                        "Fusing vector and keyword results"
                    );
                    results = inner.rrf.fuse(&[results, keyword]);
                }
                Err(err) => tracing::warn!(
                    target: TRACING_TARGET_RETRIEVAL,
                    error = %err,
                    "Keyword search failed, using vector results only"
                ),
            }
        }

        let mut reranked = false;
        if request.rerank && let Some(reranker) = &inner.reranker {
            let top_k = request.effective_rerank_top_k();
            match reranker.rerank(&request.query, results.clone(), top_k).await {
                Ok(ordered) => {
                    results = ordered;
                    reranked = true;
                }
                Err(err) => tracing::warn!(
                    target: TRACING_TARGET_RETRIEVAL,
                    reranker = reranker.name(),
                    error = %err,
                    "Rerank failed, keeping previous order"
                ),
            }
        }

        if let Some(threshold) = request.score_threshold {
            results.retain(|r| r.score >= threshold);
        }
        if !reranked {
            results.truncate(request.top_k);
        }
        tag_knowledge_base(&mut results, &kb);

        tracing::debug!(
            target: TRACING_TARGET_RETRIEVAL,
            results = results.len(),
            hybrid,
            reranked,
            "Search completed"
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            top_k: request.top_k,
            knowledge_base_id: kb.id,
            knowledge_base_name: kb.name,
            results,
        })
    }

    /// Soft-deletes a document and all of its vectors.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_RETRIEVAL)]
    pub async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        let document = self.require_document(document_id).await?;
        self.inner
            .store
            .delete_by_document(document.knowledge_base_id, document.id)
            .await?;
        self.inner.documents.soft_delete_document(document.id).await?;

        self.adjust_counters(
            document.knowledge_base_id,
            CounterDelta {
                documents: -i64::from(document.indexed_at.is_some()),
                chunks: -i64::from(document.chunk_count),
                bytes: -document.byte_size,
            },
        )
        .await;
        Ok(())
    }

    /// Soft-deletes a knowledge base, then every vector it holds.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_RETRIEVAL)]
    pub async fn delete_knowledge_base(&self, knowledge_base_id: Uuid) -> Result<()> {
        let kb = self
            .inner
            .knowledge_bases
            .find_knowledge_base(knowledge_base_id)
            .await?
            .filter(|kb| !kb.is_deleted())
            .ok_or(Error::KnowledgeBaseNotFound(knowledge_base_id))?;

        self.inner.knowledge_bases.soft_delete_knowledge_base(kb.id).await?;
        self.inner.store.delete_by_knowledge_base(kb.id).await?;

        tracing::info!(
            target: TRACING_TARGET_RETRIEVAL,
            knowledge_base_id = %kb.id,
            "Knowledge base deleted"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("store", &self.inner.store.backend_name())
            .field("embedder", &self.inner.embedder.provider_name())
            .field("hybrid", &self.inner.keyword_searcher.is_some())
            .field("rerank", &self.inner.reranker.is_some())
            .finish_non_exhaustive()
    }
}

fn tag_knowledge_base(results: &mut [SearchResult], kb: &KnowledgeBase) {
    for result in results {
        result.knowledge_base_name = Some(kb.name.clone());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::chunker::ChunkerConfig;
    use crate::embedding::HashingEmbedder;
    use crate::queue::{ChannelQueue, ProcessDocumentJob};
    use crate::repository::MemoryRepository;
    use crate::search::KeywordReranker;
    use crate::store::MemoryVectorStore;

    pub(crate) const SENTENCES: &str = "Rust guarantees memory safety without a garbage collector. \
        The borrow checker validates every reference at compile time. \
        Cargo builds the project and fetches its dependencies.";

    pub(crate) struct Fixture {
        pub service: RetrievalService,
        pub repo: Arc<MemoryRepository>,
        pub store: Arc<MemoryVectorStore>,
        pub jobs: tokio::sync::mpsc::UnboundedReceiver<ProcessDocumentJob>,
        pub kb: KnowledgeBase,
    }

    pub(crate) async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryVectorStore::with_dimensions(256));
        let (queue, jobs) = ChannelQueue::new();
        let kb = KnowledgeBase::new(Uuid::new_v4(), "handbook", "hashing-256");
        repo.insert_knowledge_base(kb.clone()).await;

        let deps = RetrievalDeps::new(
            repo.clone(),
            repo.clone(),
            store.clone(),
            Arc::new(HashingEmbedder::new(256).unwrap()),
            Arc::new(queue),
        )
        .with_chunker(Chunker::new(ChunkerConfig::new(80, 0)).unwrap())
        .with_keyword_searcher(store.clone())
        .with_reranker(Arc::new(KeywordReranker::new()));

        Fixture {
            service: RetrievalService::new(deps),
            repo,
            store,
            jobs,
            kb,
        }
    }

    pub(crate) async fn ingest(fx: &mut Fixture, file_name: &str, text: &str) -> Document {
        let kb = fx.kb.clone();
        ingest_into(fx, &kb, file_name, text).await
    }

    pub(crate) async fn ingest_into(
        fx: &mut Fixture,
        kb: &KnowledgeBase,
        file_name: &str,
        text: &str,
    ) -> Document {
        let request = UploadRequest::new(kb.id, kb.tenant_id, file_name, text.as_bytes());
        let document = fx.service.upload(request).await.unwrap();
        let job = fx.jobs.recv().await.unwrap();
        assert_eq!(job.document_id, document.id);
        fx.service
            .process_document(job.document_id, &CancellationToken::new())
            .await
            .unwrap();
        document
    }

    #[tokio::test]
    async fn test_upload_process_search_end_to_end() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;

        let stored = fx.repo.find_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.chunk_count, 3);

        let response = fx
            .service
            .search(&SearchRequest::new(fx.kb.id, "borrow checker").with_top_k(3))
            .await
            .unwrap();
        assert_eq!(response.query, "borrow checker");
        assert_eq!(response.top_k, 3);
        assert!(response.results[0].content.contains("borrow checker"));
        assert_eq!(
            response.results[0].knowledge_base_name.as_deref(),
            Some("handbook")
        );

        let nonsense = fx
            .service
            .search(&SearchRequest::new(fx.kb.id, "zxqv wibble").with_score_threshold(0.8))
            .await
            .unwrap();
        assert!(nonsense.results.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_and_rerank_search() {
        let mut fx = fixture().await;
        ingest(&mut fx, "rust.txt", SENTENCES).await;

        let request = SearchRequest::new(fx.kb.id, "Cargo dependencies")
            .with_hybrid(true)
            .with_rerank(true)
            .with_rerank_top_k(1);
        let response = fx.service.search(&request).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].content.starts_with("Cargo"));
    }

    #[tokio::test]
    async fn test_reprocessing_does_not_duplicate_chunks() {
        let mut fx = fixture().await;
        let document = ingest(&mut fx, "rust.txt", SENTENCES).await;
        fx.service
            .process_document(document.id, &CancellationToken::new())
            .await
            .unwrap();

        let stats = fx.store.get_stats(fx.kb.id).await.unwrap();
        assert_eq!(stats.total_vectors, 3);
        assert_eq!(stats.total_documents, 1);

        let kb = fx.repo.find_knowledge_base(fx.kb.id).await.unwrap().unwrap();
        assert_eq!(kb.document_count, 1);
        assert_eq!(kb.chunk_count, 3);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let fx = fixture().await;

        let missing = UploadRequest::new(Uuid::new_v4(), fx.kb.tenant_id, "a.txt", "text");
        assert!(matches!(
            fx.service.upload(missing).await,
            Err(Error::KnowledgeBaseNotFound(_))
        ));

        let wrong_tenant = UploadRequest::new(fx.kb.id, Uuid::new_v4(), "a.txt", "text");
        assert!(matches!(
            fx.service.upload(wrong_tenant).await,
            Err(Error::KnowledgeBaseNotFound(_))
        ));

        let empty = UploadRequest::new(fx.kb.id, fx.kb.tenant_id, "a.txt", "   ");
        assert!(matches!(fx.service.upload(empty).await, Err(Error::EmptyContent)));

        let unknown = UploadRequest::new(fx.kb.id, fx.kb.tenant_id, "a.pdf", "text");
        assert!(matches!(fx.service.upload(unknown).await, Err(Error::Parser(_))));
    }

    #[tokio::test]
    async fn test_enqueue_failure_marks_document_failed() {
        let fx = fixture().await;
        let Fixture {
            service, repo, jobs, kb, ..
        } = fx;
        drop(jobs);

        let request = UploadRequest::new(kb.id, kb.tenant_id, "a.txt", SENTENCES);
        assert!(matches!(service.upload(request).await, Err(Error::Queue(_))));

        let documents = repo.list_documents(kb.id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].status, DocumentStatus::Failed);
        assert!(documents[0].error_message.is_some());
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed_request(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::embedding("failing", "service unavailable"))
        }

        fn model(&self) -> &str {
            "failing"
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_marks_document_failed() {
        let repo = Arc::new(MemoryRepository::new());
        let (queue, _jobs) = ChannelQueue::new();
        let kb = KnowledgeBase::new(Uuid::nil(), "kb", "failing");
        repo.insert_knowledge_base(kb.clone()).await;
        let service = RetrievalService::new(RetrievalDeps::new(
            repo.clone(),
            repo.clone(),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(FailingEmbedder),
            Arc::new(queue),
        ));

        let document = service
            .upload(UploadRequest::new(kb.id, kb.tenant_id, "a.txt", SENTENCES))
            .await
            .unwrap();
        let err = service
            .process_document(document.id, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let stored = repo.find_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(stored.error_message.unwrap().contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_cancelled_processing_returns_to_pending() {
        let mut fx = fixture().await;
        let request = UploadRequest::new(fx.kb.id, fx.kb.tenant_id, "a.txt", SENTENCES);
        let document = fx.service.upload(request).await.unwrap();
        fx.jobs.recv().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fx.service.process_document(document.id, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let stored = fx.repo.find_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert_eq!(fx.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_delete_document_and_knowledge_base() {
        let mut fx = fixture().await;
        let first = ingest(&mut fx, "a.txt", SENTENCES).await;
        ingest(&mut fx, "b.txt", "Tokio schedules async tasks. It uses a work stealing scheduler.")
            .await;

        fx.service.delete_document(first.id).await.unwrap();
        let stats = fx.store.get_stats(fx.kb.id).await.unwrap();
        assert_eq!(stats.total_documents, 1);
        let kb = fx.repo.find_knowledge_base(fx.kb.id).await.unwrap().unwrap();
        assert_eq!(kb.document_count, 1);

        fx.service.delete_knowledge_base(fx.kb.id).await.unwrap();
        assert_eq!(fx.store.get_stats(fx.kb.id).await.unwrap().total_vectors, 0);
        assert!(matches!(
            fx.service.search(&SearchRequest::new(fx.kb.id, "tokio")).await,
            Err(Error::KnowledgeBaseNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.search(&SearchRequest::new(fx.kb.id, "  ")).await,
            Err(Error::EmptyContent)
        ));
    }
}
