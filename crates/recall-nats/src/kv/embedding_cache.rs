//! Distributed embedding cache tier on a JetStream KV bucket.

use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use jiff::Timestamp;
use recall_core::embedding::{CacheTier, CachedEmbedding};

use crate::{Error, Result, TRACING_TARGET_KV};

/// Bucket holding cached embeddings.
pub const EMBEDDING_BUCKET: &str = "recall-embeddings";

/// Maps a cache key onto the KV key alphabet `[-/_=.a-zA-Z0-9]`.
///
/// `:` separators become `.`; any other character outside the alphabet
/// becomes `_`.
pub fn kv_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            ':' => '.',
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_' | '=' | '.') => c,
            _ => '_',
        })
        .collect()
}

/// [`CacheTier`] backed by the [`EMBEDDING_BUCKET`] KV bucket.
///
/// Entry lifetime is the bucket's `max_age`, fixed when the bucket is created;
/// the per-call TTL of [`CacheTier::set`] cannot extend it. Entries older than
/// the lifetime are treated as misses on read even before the server drops them.
#[derive(Clone)]
pub struct NatsEmbeddingCache {
    store: kv::Store,
    ttl: Duration,
}

impl NatsEmbeddingCache {
    /// Gets or creates the bucket with entries expiring after `ttl`.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_KV)]
    pub async fn new(jetstream: &jetstream::Context, ttl: Duration) -> Result<Self> {
        let store = match jetstream.get_key_value(EMBEDDING_BUCKET).await {
            Ok(store) => {
                tracing::debug!(
                    target: TRACING_TARGET_KV,
                    bucket = EMBEDDING_BUCKET,
                    "Using existing KV bucket"
                );
                store
            }
            Err(_) => {
                tracing::info!(
                    target: TRACING_TARGET_KV,
                    bucket = EMBEDDING_BUCKET,
                    ttl_secs = ttl.as_secs(),
                    "Creating KV bucket"
                );
                jetstream
                    .create_key_value(kv::Config {
                        bucket: EMBEDDING_BUCKET.to_owned(),
                        description: "Recall embedding cache".to_owned(),
                        max_age: ttl,
                        history: 1,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::operation("kv_create", e.to_string()))?
            }
        };

        Ok(Self { store, ttl })
    }

    /// Returns the bucket lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get_entry(&self, key: &str) -> Result<Option<CachedEmbedding>> {
        let key = kv_key(key);
        let Some(bytes) = self
            .store
            .get(&key)
            .await
            .map_err(|e| Error::operation("kv_get", e.to_string()))?
        else {
            return Ok(None);
        };

        let entry: CachedEmbedding = serde_json::from_slice(&bytes)?;
        if is_expired(&entry, self.ttl) {
            tracing::trace!(target: TRACING_TARGET_KV, key = %key, "Cached embedding expired");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put_entry(&self, key: &str, value: &CachedEmbedding) -> Result<()> {
        let key = kv_key(key);
        let payload = serde_json::to_vec(value)?;
        let size = payload.len();
        let revision = self
            .store
            .put(&key, payload.into())
            .await
            .map_err(|e| Error::operation("kv_put", e.to_string()))?;

        tracing::trace!(
            target: TRACING_TARGET_KV,
            key = %key,
            revision,
            size_bytes = size,
            "Cached embedding"
        );
        Ok(())
    }
}

fn is_expired(entry: &CachedEmbedding, ttl: Duration) -> bool {
    let age = Timestamp::now().duration_since(entry.created_at);
    u64::try_from(age.as_secs()).is_ok_and(|age| age > ttl.as_secs())
}

impl std::fmt::Debug for NatsEmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEmbeddingCache")
            .field("bucket", &EMBEDDING_BUCKET)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait]
impl CacheTier for NatsEmbeddingCache {
    async fn get(&self, key: &str) -> recall_core::Result<Option<CachedEmbedding>> {
        self.get_entry(key).await.map_err(Error::into_cache)
    }

    async fn set(&self, key: &str, value: &CachedEmbedding, _ttl: Duration) -> recall_core::Result<()> {
        self.put_entry(key, value).await.map_err(Error::into_cache)
    }
}
