//! OpenAI-compatible embedding client.
//!
//! Works with any service exposing `POST {base_url}/embeddings` with the
//! OpenAI request and response shape (OpenAI, Azure proxies, Ollama, vLLM).

use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "config")]
use clap::Args;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_MAX_BATCH_SIZE, EmbeddingProvider};
use crate::{Error, Result, TRACING_TARGET_EMBEDDING};

/// Provider name reported by [`OpenAiEmbedder`].
pub const OPENAI_PROVIDER_NAME: &str = "openai";

/// Configuration for [`OpenAiEmbedder`].
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct OpenAiEmbedderConfig {
    /// Base URL of the embeddings API
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-base-url",
            env = "EMBEDDING_BASE_URL",
            default_value = "https://api.openai.com/v1"
        )
    )]
    pub embedding_base_url: String,

    /// API key sent as a bearer token (optional for local services)
    #[cfg_attr(
        feature = "config",
        arg(long = "embedding-api-key", env = "EMBEDDING_API_KEY")
    )]
    pub embedding_api_key: Option<String>,

    /// Embedding model name
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-model",
            env = "EMBEDDING_MODEL",
            default_value = "text-embedding-3-small"
        )
    )]
    pub embedding_model: String,

    /// Maximum texts per request
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-batch-size",
            env = "EMBEDDING_BATCH_SIZE",
            default_value = "96"
        )
    )]
    pub embedding_batch_size: usize,

    /// Request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-timeout-secs",
            env = "EMBEDDING_TIMEOUT_SECS",
            default_value = "30"
        )
    )]
    pub embedding_timeout_secs: u64,
}

impl OpenAiEmbedderConfig {
    /// Creates a configuration for the given endpoint and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            embedding_base_url: base_url.into(),
            embedding_api_key: None,
            embedding_model: model.into(),
            embedding_batch_size: DEFAULT_MAX_BATCH_SIZE,
            embedding_timeout_secs: 30,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.embedding_api_key = Some(api_key.into());
        self
    }

    /// Sets the per-request batch limit.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size;
        self
    }

    /// Returns the request timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.embedding_base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiEmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedderConfig")
            .field("embedding_base_url", &self.embedding_base_url)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "***"),
            )
            .field("embedding_model", &self.embedding_model)
            .field("embedding_batch_size", &self.embedding_batch_size)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP embedding provider for OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    http: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    /// Creates a client for the configured endpoint.
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        if config.embedding_model.is_empty() {
            return Err(Error::invalid_config("embedding model must not be empty"));
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("recall/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(
            target: TRACING_TARGET_EMBEDDING,
            base_url = %config.embedding_base_url,
            model = %config.embedding_model,
            batch_size = config.embedding_batch_size,
            "Created OpenAI-compatible embedder"
        );

        Ok(Self { http, config })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_EMBEDDING, fields(count = texts.len()))]
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        let mut request = self.http.post(self.config.endpoint()).json(&body);
        if let Some(key) = &self.config.embedding_api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::embedding(OPENAI_PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: TRACING_TARGET_EMBEDDING,
                status = %status,
                "Embedding request rejected"
            );
            return Err(Error::embedding(
                OPENAI_PROVIDER_NAME,
                format!("HTTP {status}: {detail}"),
            ));
        }

        let mut payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(OPENAI_PROVIDER_NAME, e.to_string()))?;

        payload.data.sort_by_key(|d| d.index);
        Ok(payload.data.into_iter().map(|d| d.embedding).collect())
    }

    fn max_batch_size(&self) -> usize {
        self.config.embedding_batch_size
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    fn provider_name(&self) -> &str {
        OPENAI_PROVIDER_NAME
    }
}
