//! Error types for the retrieval engine.

use uuid::Uuid;

/// Result type for all retrieval-engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for the retrieval engine.
///
/// Backend crates convert their own errors into this type at the trait
/// boundary, adding the failed operation as context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document or query text is empty after normalization.
    #[error("content is empty")]
    EmptyContent,

    /// Knowledge base does not exist or was deleted.
    #[error("knowledge base not found: {0}")]
    KnowledgeBaseNotFound(Uuid),

    /// Document does not exist or was deleted.
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Vector length does not match the store dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider failure.
    #[error("embedding provider '{provider}' failed: {message}")]
    Embedding { provider: String, message: String },

    /// Vector store failure.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Keyword searcher failure.
    #[error("keyword search error: {0}")]
    KeywordSearch(String),

    /// Reranker failure.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Document parser failure.
    #[error("parser error: {0}")]
    Parser(String),

    /// Task queue failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// Relational repository failure.
    #[error("repository error: {0}")]
    Repository(String),

    /// Distributed cache failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates an embedding error for the named provider.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a vector store error.
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Creates a keyword search error.
    pub fn keyword_search(message: impl Into<String>) -> Self {
        Self::KeywordSearch(message.into())
    }

    /// Creates a rerank error.
    pub fn rerank(message: impl Into<String>) -> Self {
        Self::Rerank(message.into())
    }

    /// Creates a parser error.
    pub fn parser(message: impl Into<String>) -> Self {
        Self::Parser(message.into())
    }

    /// Creates a queue error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue(message.into())
    }

    /// Creates a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository(message.into())
    }

    /// Creates a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Returns whether this error is an input validation failure.
    ///
    /// Validation failures are fatal and must never be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyContent
                | Error::KnowledgeBaseNotFound(_)
                | Error::DocumentNotFound(_)
                | Error::DimensionMismatch { .. }
                | Error::InvalidConfig(_)
        )
    }

    /// Returns whether retrying the operation at the queue layer may succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_validation() && !matches!(self, Error::Cancelled | Error::Serialization(_))
    }
}
