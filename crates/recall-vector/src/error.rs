//! Vector store error types.

use recall_postgres::PgError;
use thiserror::Error;

/// Result type for vector store operations.
pub type VectorResult<T> = Result<T, VectorError>;

/// Vector store errors.
#[derive(Debug, Error)]
pub enum VectorError {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vector length differs from the collection dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The backend rejected or failed an operation.
    #[error("{0}")]
    Backend(String),

    /// Database failure in the pgvector backend.
    #[error("pgvector {operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: PgError,
    },

    /// Response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VectorError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates a backend error; the message names the failed operation.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns a closure wrapping a database error with the operation name.
    pub(crate) fn database(operation: &'static str) -> impl FnOnce(PgError) -> Self {
        move |source| Self::Database { operation, source }
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<VectorError> for recall_core::Error {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                recall_core::Error::dimension_mismatch(expected, actual)
            }
            VectorError::InvalidConfig(msg) => recall_core::Error::invalid_config(msg),
            other => recall_core::Error::vector_store(other.to_string()),
        }
    }
}
