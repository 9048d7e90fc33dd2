//! Embedding provider abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result, TRACING_TARGET_EMBEDDING};

/// Default number of texts sent in a single provider request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 96;

/// Turns text into fixed-length vectors.
///
/// Implementors provide [`embed_request`], a single call carrying at most
/// [`max_batch_size`] texts. [`embed_batch`] splits larger inputs into
/// sequential sub-requests and concatenates the results in input order.
///
/// [`embed_request`]: EmbeddingProvider::embed_request
/// [`embed_batch`]: EmbeddingProvider::embed_batch
/// [`max_batch_size`]: EmbeddingProvider::max_batch_size
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch that fits in one provider call.
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding(self.provider_name(), "provider returned no vector"))
    }

    /// Embeds any number of texts, one vector per input, in input order.
    ///
    /// A failure in any sub-request fails the whole batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.max_batch_size().max(1);
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch, sub) in texts.chunks(limit).enumerate() {
            tracing::trace!(
                target: TRACING_TARGET_EMBEDDING,
                provider = self.provider_name(),
                batch = batch,
                size = sub.len(),
                "Sending embedding sub-request"
            );

            let embedded = self.embed_request(sub).await?;
            if embedded.len() != sub.len() {
                return Err(Error::embedding(
                    self.provider_name(),
                    format!("expected {} vectors, got {}", sub.len(), embedded.len()),
                ));
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Maximum number of texts per provider call.
    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    /// Embedding model name.
    fn model(&self) -> &str;

    /// Provider name, used in logs, errors and stored vector metadata.
    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_request(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Runs [`EmbeddingProvider::embed_batch`], aborting when `cancel` fires.
pub async fn embed_batch_cancellable(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<Vec<f32>>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = provider.embed_batch(texts) => result,
    }
}
