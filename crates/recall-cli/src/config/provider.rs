//! Embedding, vector store and reranker selection.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use recall_core::embedding::{EmbeddingProvider, HashingEmbedder, OpenAiEmbedder, OpenAiEmbedderConfig};
use recall_core::search::rerank::{CrossEncoderConfig, CrossEncoderReranker};
use recall_core::search::{KeywordReranker, Reranker};
use recall_vector::{QdrantConfig, VectorBackend};

/// Embedding provider implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint.
    #[default]
    Openai,
    /// Local feature hashing; no network, for development and tests.
    Hashing,
}

/// Embedding provider arguments.
#[derive(Debug, Clone, Args)]
pub struct EmbeddingArgs {
    /// Embedding provider
    #[arg(
        long = "embedding-provider",
        env = "EMBEDDING_PROVIDER",
        value_enum,
        default_value_t = EmbeddingBackend::Openai
    )]
    pub embedding_provider: EmbeddingBackend,

    /// Vector dimension of the hashing provider
    #[arg(long = "hashing-dimensions", env = "HASHING_DIMENSIONS", default_value = "384")]
    pub hashing_dimensions: usize,

    #[clap(flatten)]
    pub openai: OpenAiEmbedderConfig,
}

impl EmbeddingArgs {
    /// Returns the model name the selected provider will report.
    pub fn model_name(&self) -> String {
        match self.embedding_provider {
            EmbeddingBackend::Openai => self.openai.embedding_model.clone(),
            EmbeddingBackend::Hashing => format!("hashing-{}", self.hashing_dimensions),
        }
    }

    /// Validates the selected provider's settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.embedding_provider {
            EmbeddingBackend::Openai => {
                if self.openai.embedding_model.is_empty() {
                    anyhow::bail!("embedding model must not be empty");
                }
                if self.openai.embedding_batch_size == 0 {
                    anyhow::bail!("embedding batch size must be positive");
                }
            }
            EmbeddingBackend::Hashing => {
                if self.hashing_dimensions == 0 {
                    anyhow::bail!("hashing dimensions must be positive");
                }
            }
        }
        Ok(())
    }

    /// Creates the selected provider without caching.
    pub fn create_embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let embedder: Arc<dyn EmbeddingProvider> = match self.embedding_provider {
            EmbeddingBackend::Openai => Arc::new(
                OpenAiEmbedder::new(self.openai.clone())
                    .context("failed to create OpenAI embedder")?,
            ),
            EmbeddingBackend::Hashing => Arc::new(
                HashingEmbedder::new(self.hashing_dimensions)
                    .context("failed to create hashing embedder")?,
            ),
        };
        Ok(embedder)
    }

    /// Returns the vector dimension when it is known without a request.
    pub fn known_dimensions(&self) -> Option<usize> {
        match self.embedding_provider {
            EmbeddingBackend::Openai => None,
            EmbeddingBackend::Hashing => Some(self.hashing_dimensions),
        }
    }
}

/// Vector store arguments.
#[derive(Debug, Clone, Args)]
pub struct VectorArgs {
    /// Vector store backend
    #[arg(
        long = "vector-backend",
        env = "VECTOR_BACKEND",
        value_enum,
        default_value_t = VectorBackend::Pgvector
    )]
    pub vector_backend: VectorBackend,

    /// Expected embedding dimension; writes and queries of another size are rejected
    #[arg(long = "vector-dimensions", env = "VECTOR_DIMENSIONS")]
    pub vector_dimensions: Option<usize>,

    #[clap(flatten)]
    pub qdrant: QdrantConfig,
}

impl VectorArgs {
    /// Validates the selected backend's settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vector_dimensions == Some(0) {
            anyhow::bail!("vector dimensions must be positive");
        }
        if self.vector_backend == VectorBackend::Qdrant {
            self.qdrant.validate()?;
        }
        Ok(())
    }
}

/// Reranker arguments.
///
/// Without `--rerank-url` the local keyword scorer is used.
#[derive(Debug, Clone, Args)]
pub struct RerankArgs {
    /// Cross-encoder scoring endpoint
    #[arg(long = "rerank-url", env = "RERANK_URL")]
    pub rerank_url: Option<String>,

    /// Bearer token for the scoring endpoint
    #[arg(long = "rerank-api-key", env = "RERANK_API_KEY", hide_env_values = true)]
    pub rerank_api_key: Option<String>,

    /// Model name sent with each scoring request
    #[arg(long = "rerank-model", env = "RERANK_MODEL")]
    pub rerank_model: Option<String>,

    /// Scoring request timeout in seconds
    #[arg(long = "rerank-timeout-secs", env = "RERANK_TIMEOUT_SECS", default_value = "15")]
    pub rerank_timeout_secs: u64,
}

impl RerankArgs {
    /// Creates the cross-encoder when an endpoint is configured, otherwise the keyword scorer.
    pub fn create_reranker(&self) -> anyhow::Result<Arc<dyn Reranker>> {
        let Some(url) = &self.rerank_url else {
            return Ok(Arc::new(KeywordReranker::new()));
        };

        let mut config = CrossEncoderConfig::new(url.clone());
        config.rerank_timeout_secs = self.rerank_timeout_secs;
        if let Some(api_key) = &self.rerank_api_key {
            config = config.with_api_key(api_key.clone());
        }
        if let Some(model) = &self.rerank_model {
            config = config.with_model(model.clone());
        }

        let reranker =
            CrossEncoderReranker::new(config).context("failed to create cross-encoder reranker")?;
        Ok(Arc::new(reranker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashing(dimensions: usize) -> EmbeddingArgs {
        EmbeddingArgs {
            embedding_provider: EmbeddingBackend::Hashing,
            hashing_dimensions: dimensions,
            openai: OpenAiEmbedderConfig::new("https://api.openai.com/v1", "text-embedding-3-small"),
        }
    }

    #[test]
    fn test_hashing_model_name_matches_embedder() {
        let args = hashing(128);
        let embedder = args.create_embedder().unwrap();
        assert_eq!(embedder.model(), args.model_name());
        assert_eq!(args.known_dimensions(), Some(128));
    }

    #[test]
    fn test_zero_hashing_dimensions_is_invalid() {
        assert!(hashing(0).validate().is_err());
    }

    #[test]
    fn test_openai_model_name() {
        let args = EmbeddingArgs {
            embedding_provider: EmbeddingBackend::Openai,
            ..hashing(64)
        };
        assert_eq!(args.model_name(), "text-embedding-3-small");
        assert_eq!(args.known_dimensions(), None);
    }

    #[test]
    fn test_qdrant_validated_only_when_selected() {
        let mut args = VectorArgs {
            vector_backend: VectorBackend::Pgvector,
            vector_dimensions: None,
            qdrant: QdrantConfig::new("ftp://example.com"),
        };
        assert!(args.validate().is_ok());

        args.vector_backend = VectorBackend::Qdrant;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_reranker_falls_back_to_keyword_scorer() {
        let args = RerankArgs {
            rerank_url: None,
            rerank_api_key: None,
            rerank_model: None,
            rerank_timeout_secs: 15,
        };
        assert!(args.create_reranker().is_ok());
    }
}
