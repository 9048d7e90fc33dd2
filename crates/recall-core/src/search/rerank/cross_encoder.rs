//! HTTP cross-encoder reranker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "config")]
use clap::Args;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{KeywordReranker, Reranker};
use crate::model::{SearchResult, sort_by_score_desc};
use crate::{Error, Result, TRACING_TARGET_SEARCH};

/// Configuration for [`CrossEncoderReranker`].
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct CrossEncoderConfig {
    /// Scoring endpoint accepting `{query, documents}`
    #[cfg_attr(feature = "config", arg(long = "rerank-url", env = "RERANK_URL"))]
    pub rerank_url: String,

    /// Bearer token for the scoring service
    #[cfg_attr(feature = "config", arg(long = "rerank-api-key", env = "RERANK_API_KEY"))]
    pub rerank_api_key: Option<String>,

    /// Model name forwarded to the scoring service
    #[cfg_attr(feature = "config", arg(long = "rerank-model", env = "RERANK_MODEL"))]
    pub rerank_model: Option<String>,

    /// Request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "rerank-timeout-secs", env = "RERANK_TIMEOUT_SECS", default_value = "15")
    )]
    pub rerank_timeout_secs: u64,
}

impl CrossEncoderConfig {
    /// Creates a configuration for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            rerank_url: url.into(),
            rerank_api_key: None,
            rerank_model: None,
            rerank_timeout_secs: 15,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.rerank_api_key = Some(api_key.into());
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = Some(model.into());
        self
    }
}

impl std::fmt::Debug for CrossEncoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderConfig")
            .field("rerank_url", &self.rerank_url)
            .field("rerank_api_key", &self.rerank_api_key.as_ref().map(|_| "***"))
            .field("rerank_model", &self.rerank_model)
            .field("rerank_timeout_secs", &self.rerank_timeout_secs)
            .finish()
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankScore>,
}

#[derive(Deserialize)]
struct RerankScore {
    index: usize,
    relevance_score: f32,
}

struct CrossEncoderInner {
    http: Client,
    config: CrossEncoderConfig,
    fallback: KeywordReranker,
}

/// Reranker backed by an external cross-encoder scoring service.
///
/// Any transport or decoding failure degrades to [`KeywordReranker`], so this
/// reranker never fails a search.
#[derive(Clone)]
pub struct CrossEncoderReranker {
    inner: Arc<CrossEncoderInner>,
}

impl CrossEncoderReranker {
    /// Creates a reranker for the configured endpoint.
    pub fn new(config: CrossEncoderConfig) -> Result<Self> {
        if config.rerank_url.is_empty() {
            return Err(Error::invalid_config("rerank url must not be empty"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.rerank_timeout_secs))
            .user_agent(format!("recall/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(CrossEncoderInner {
                http,
                config,
                fallback: KeywordReranker::new(),
            }),
        })
    }

    async fn score_remote(&self, query: &str, results: &[SearchResult]) -> Result<Vec<f32>> {
        let config = &self.inner.config;
        let body = RerankRequest {
            model: config.rerank_model.as_deref(),
            query,
            documents: results.iter().map(|r| r.content.as_str()).collect(),
        };

        let mut request = self.inner.http.post(&config.rerank_url).json(&body);
        if let Some(key) = &config.rerank_api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::rerank(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::rerank(format!("scoring service returned HTTP {status}")));
        }

        let payload: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::rerank(format!("invalid response: {e}")))?;

        let mut scores = vec![f32::NEG_INFINITY; results.len()];
        for item in payload.results {
            let slot = scores
                .get_mut(item.index)
                .ok_or_else(|| Error::rerank(format!("score index {} out of range", item.index)))?;
            *slot = item.relevance_score;
        }
        Ok(scores)
    }
}

impl std::fmt::Debug for CrossEncoderReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderReranker")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_SEARCH, fields(candidates = results.len()))]
    async fn rerank(
        &self,
        query: &str,
        mut results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        match self.score_remote(query, &results).await {
            Ok(scores) => {
                for (result, score) in results.iter_mut().zip(scores) {
                    result.score = score;
                }
                sort_by_score_desc(&mut results);
                results.truncate(top_k);
                Ok(results)
            }
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_SEARCH,
                    error = %err,
                    "Cross-encoder rerank failed, falling back to keyword scoring"
                );
                Ok(self.inner.fallback.rerank_sync(query, results, top_k))
            }
        }
    }

    fn name(&self) -> &str {
        "cross-encoder"
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_request_shape() {
        let body = RerankRequest {
            model: None,
            query: "q",
            documents: vec!["a", "b"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"query": "q", "documents": ["a", "b"]}));
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(CrossEncoderReranker::new(CrossEncoderConfig::new("")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let config = CrossEncoderConfig::new("http://127.0.0.1:9/rerank");
        let reranker = CrossEncoderReranker::new(config).unwrap();
        let results = vec![
            SearchResult::new(Uuid::from_u128(1), Uuid::nil(), Uuid::nil(), "unrelated text", 0.9),
            SearchResult::new(Uuid::from_u128(2), Uuid::nil(), Uuid::nil(), "tokio runtime", 0.8),
        ];

        let reranked = reranker.rerank("tokio runtime", results, 1).await.unwrap();
        assert_eq!(reranked.len(), 1);
        assert_eq!(reranked[0].chunk_id, Uuid::from_u128(2));
    }
}
