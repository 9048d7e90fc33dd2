//! Service wiring from CLI configuration.

use std::sync::Arc;

use anyhow::Context;
use recall_core::embedding::{CachedEmbeddingProvider, EmbeddingCache, EmbeddingProvider};
use recall_core::queue::{ChannelQueue, DocumentQueue, ProcessDocumentJob};
use recall_core::retrieval::{RetrievalDeps, RetrievalService};
use recall_core::search::KeywordSearcher;
use recall_core::store::VectorStore;
use recall_nats::NatsClient;
use recall_postgres::PgClient;
use recall_vector::{PgVectorStore, QdrantVectorStore, VectorBackend};
use tokio::sync::mpsc::UnboundedReceiver;

use super::Cli;
use crate::TRACING_TARGET_STARTUP;

/// Where uploaded documents are queued for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// JetStream work queue consumed by `recall worker`.
    Nats,
    /// In-process channel drained by the command itself.
    Inline,
}

/// Connected collaborators for one command.
pub struct Services {
    pub nats: Option<NatsClient>,
    pub retrieval: RetrievalService,
    /// Receiver of the in-process queue in [`QueueMode::Inline`].
    pub inline_jobs: Option<UnboundedReceiver<ProcessDocumentJob>>,
}

/// Connects the backends and builds the retrieval service.
///
/// NATS is connected when the queue mode or the distributed cache needs it.
pub async fn create_services(cli: &Cli, mode: QueueMode) -> anyhow::Result<Services> {
    let postgres =
        PgClient::new(cli.postgres.clone()).context("failed to create postgres client")?;

    let nats = if mode == QueueMode::Nats || cli.cache_distributed {
        let client = NatsClient::connect(cli.nats.clone())
            .await
            .context("failed to connect to NATS")?;
        Some(client)
    } else {
        None
    };

    let embedder = create_embedder(cli, nats.as_ref()).await?;
    let (store, keyword_searcher) = create_vector_store(cli, &postgres).await?;

    let (queue, inline_jobs) = match mode {
        QueueMode::Nats => {
            let nats = nats
                .as_ref()
                .context("the work queue requires a NATS connection")?;
            let queue = nats
                .document_queue()
                .await
                .context("failed to open document queue")?;
            let queue: Arc<dyn DocumentQueue> = Arc::new(queue);
            (queue, None)
        }
        QueueMode::Inline => {
            let (queue, jobs) = ChannelQueue::new();
            let queue: Arc<dyn DocumentQueue> = Arc::new(queue);
            (queue, Some(jobs))
        }
    };

    let repository = Arc::new(postgres);
    let mut deps = RetrievalDeps::new(repository.clone(), repository, store, embedder, queue)
        .with_reranker(cli.rerank.create_reranker()?);
    if let Some(searcher) = keyword_searcher {
        deps = deps.with_keyword_searcher(searcher);
    }

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        vector_backend = %cli.vector.vector_backend,
        queue = ?mode,
        hybrid = deps.keyword_searcher.is_some(),
        distributed_cache = cli.cache_distributed,
        "Services ready"
    );

    Ok(Services {
        nats,
        retrieval: RetrievalService::new(deps),
        inline_jobs,
    })
}

/// Creates the configured provider behind the two-tier embedding cache.
async fn create_embedder(
    cli: &Cli,
    nats: Option<&NatsClient>,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let provider = cli.embedding.create_embedder()?;

    let mut cache = EmbeddingCache::new(cli.cache.clone());
    if cli.cache_distributed {
        let nats = nats.context("the distributed cache requires a NATS connection")?;
        let remote = nats
            .embedding_cache(cli.cache.ttl())
            .await
            .context("failed to open embedding cache bucket")?;
        cache = cache.with_remote(Arc::new(remote));
    }

    Ok(Arc::new(CachedEmbeddingProvider::new(provider, Arc::new(cache))))
}

/// Creates the vector store and, for pgvector, its full-text keyword searcher.
async fn create_vector_store(
    cli: &Cli,
    postgres: &PgClient,
) -> anyhow::Result<(Arc<dyn VectorStore>, Option<Arc<dyn KeywordSearcher>>)> {
    let dimensions = cli
        .vector
        .vector_dimensions
        .or(cli.embedding.known_dimensions());

    match cli.vector.vector_backend {
        VectorBackend::Pgvector => {
            let mut store = PgVectorStore::new(postgres.clone())
                .await
                .context("failed to initialize pgvector store")?;
            if let Some(dimensions) = dimensions {
                store = store.with_dimensions(dimensions);
            }
            let store = Arc::new(store);
            let searcher: Arc<dyn KeywordSearcher> = store.clone();
            let store: Arc<dyn VectorStore> = store;
            Ok((store, Some(searcher)))
        }
        VectorBackend::Qdrant => {
            let mut config = cli.vector.qdrant.clone();
            if let (None, Some(dimensions)) = (config.qdrant_dimensions, dimensions) {
                config = config.with_dimensions(dimensions);
            }
            let store: Arc<dyn VectorStore> = Arc::new(
                QdrantVectorStore::new(config).context("failed to create Qdrant client")?,
            );
            Ok((store, None))
        }
    }
}
