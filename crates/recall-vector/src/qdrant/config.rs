//! Qdrant connection configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{VectorError, VectorResult};

/// Default collection holding recall chunks.
pub const DEFAULT_COLLECTION: &str = "recall_chunks";

/// Configuration for [`QdrantVectorStore`](super::QdrantVectorStore).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct QdrantConfig {
    /// Qdrant REST endpoint (e.g. "http://localhost:6333")
    #[cfg_attr(
        feature = "config",
        arg(long = "qdrant-url", env = "QDRANT_URL", default_value = "http://localhost:6333")
    )]
    pub qdrant_url: String,

    /// API key sent in the `api-key` header
    #[cfg_attr(feature = "config", arg(long = "qdrant-api-key", env = "QDRANT_API_KEY"))]
    pub qdrant_api_key: Option<String>,

    /// Collection storing one point per chunk
    #[cfg_attr(
        feature = "config",
        arg(long = "qdrant-collection", env = "QDRANT_COLLECTION", default_value = DEFAULT_COLLECTION)
    )]
    pub qdrant_collection: String,

    /// Embedding dimension used when the collection is created
    #[cfg_attr(feature = "config", arg(long = "qdrant-dimensions", env = "QDRANT_DIMENSIONS"))]
    pub qdrant_dimensions: Option<usize>,

    /// Request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "qdrant-timeout-secs", env = "QDRANT_TIMEOUT_SECS", default_value = "30")
    )]
    pub qdrant_timeout_secs: u64,
}

impl QdrantConfig {
    /// Creates a configuration for the given endpoint with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            qdrant_collection: DEFAULT_COLLECTION.to_owned(),
            qdrant_dimensions: None,
            qdrant_timeout_secs: 30,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.qdrant_api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.qdrant_collection = collection.into();
        self
    }

    /// Fixes the vector size; without it the first write decides.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.qdrant_dimensions = Some(dimensions);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.qdrant_timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the request timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.qdrant_timeout_secs)
    }

    /// Returns the endpoint without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.qdrant_url.trim_end_matches('/')
    }

    /// Returns the URL of the configured collection.
    pub fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url(), self.qdrant_collection)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> VectorResult<()> {
        if self.qdrant_url.is_empty() {
            return Err(VectorError::invalid_config("qdrant url cannot be empty"));
        }

        if !self.qdrant_url.starts_with("http://") && !self.qdrant_url.starts_with("https://") {
            return Err(VectorError::invalid_config(
                "qdrant url must start with http:// or https://",
            ));
        }

        if self.qdrant_collection.is_empty() {
            return Err(VectorError::invalid_config("qdrant collection cannot be empty"));
        }

        if self.qdrant_dimensions == Some(0) {
            return Err(VectorError::invalid_config("qdrant dimensions must be positive"));
        }

        if self.qdrant_timeout_secs == 0 {
            return Err(VectorError::invalid_config("qdrant timeout must be positive"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &self.qdrant_api_key.as_ref().map(|_| "***"))
            .field("qdrant_collection", &self.qdrant_collection)
            .field("qdrant_dimensions", &self.qdrant_dimensions)
            .field("qdrant_timeout_secs", &self.qdrant_timeout_secs)
            .finish()
    }
}
