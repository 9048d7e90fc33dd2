//! Two-tier embedding cache.
//!
//! The local tier is an in-process map bounded to `max_local_size` entries;
//! when it is full roughly half of the entries are evicted at once. The
//! optional distributed tier is any [`CacheTier`] with a TTL. Lookups try the
//! local tier first and populate it on a distributed hit. Both tiers are pure
//! caches: distributed-tier failures are logged and treated as misses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(feature = "config")]
use clap::Args;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use super::EmbeddingProvider;
use crate::{Error, Result, TRACING_TARGET_CACHE};

/// Default key prefix.
pub const DEFAULT_CACHE_PREFIX: &str = "emb:";

/// Default local-tier capacity.
pub const DEFAULT_MAX_LOCAL_SIZE: usize = 10_000;

/// Default entry lifetime: 7 days.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the [`EmbeddingCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct EmbeddingCacheConfig {
    /// Prefix prepended to every cache key
    #[cfg_attr(
        feature = "config",
        arg(long = "cache-prefix", env = "CACHE_PREFIX", default_value = "emb:")
    )]
    pub cache_prefix: String,

    /// Maximum number of entries kept in process
    #[cfg_attr(
        feature = "config",
        arg(
            long = "cache-max-local-size",
            env = "CACHE_MAX_LOCAL_SIZE",
            default_value = "10000"
        )
    )]
    pub cache_max_local_size: usize,

    /// Entry lifetime in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "cache-ttl-secs", env = "CACHE_TTL_SECS", default_value = "604800")
    )]
    pub cache_ttl_secs: u64,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: DEFAULT_CACHE_PREFIX.to_owned(),
            cache_max_local_size: DEFAULT_MAX_LOCAL_SIZE,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl EmbeddingCacheConfig {
    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Sets the local-tier capacity.
    #[must_use]
    pub fn with_max_local_size(mut self, size: usize) -> Self {
        self.cache_max_local_size = size;
        self
    }

    /// Sets the entry lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Returns the entry lifetime.
    #[inline]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// A cached vector with the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEmbedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub created_at: Timestamp,
}

impl CachedEmbedding {
    /// Creates an entry stamped with the current time.
    pub fn new(vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            vector,
            model: model.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// A distributed key-value tier with per-entry TTL.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Fetches an entry.
    async fn get(&self, key: &str) -> Result<Option<CachedEmbedding>>;

    /// Stores an entry for at most `ttl`.
    async fn set(&self, key: &str, value: &CachedEmbedding, ttl: Duration) -> Result<()>;
}

/// Builds the cache key: `prefix + model + ":" + hex(sha256(text))[..16]`.
pub fn cache_key(prefix: &str, model: &str, text: &str) -> String {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    format!("{prefix}{model}:{}", &digest[..16])
}

struct LocalEntry {
    vector: Vec<f32>,
    expires_at: Instant,
}

/// Two-tier cache of embedding vectors keyed by model and text.
pub struct EmbeddingCache {
    config: EmbeddingCacheConfig,
    local: RwLock<HashMap<String, LocalEntry>>,
    remote: Option<Arc<dyn CacheTier>>,
}

impl EmbeddingCache {
    /// Creates a cache with only the local tier.
    pub fn new(config: EmbeddingCacheConfig) -> Self {
        Self {
            config,
            local: RwLock::new(HashMap::new()),
            remote: None,
        }
    }

    /// Attaches a distributed tier.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn CacheTier>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Returns the cache configuration.
    #[inline]
    pub fn config(&self) -> &EmbeddingCacheConfig {
        &self.config
    }

    /// Returns the key for `text` embedded with `model`.
    pub fn key(&self, model: &str, text: &str) -> String {
        cache_key(&self.config.cache_prefix, model, text)
    }

    /// Number of entries currently held in process.
    pub async fn local_len(&self) -> usize {
        self.local.read().await.len()
    }

    /// Looks up a single vector.
    pub async fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        let key = self.key(model, text);

        if let Some(vector) = self.get_local(&key).await {
            return Some(vector);
        }

        let remote = self.remote.as_ref()?;
        match remote.get(&key).await {
            Ok(Some(entry)) if entry.model == model => {
                tracing::trace!(target: TRACING_TARGET_CACHE, key = %key, "Distributed cache hit");
                self.put_local(key, entry.vector.clone()).await;
                Some(entry.vector)
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_CACHE,
                    key = %key,
                    error = %err,
                    "Distributed cache lookup failed, treating as miss"
                );
                None
            }
        }
    }

    /// Stores a single vector in both tiers.
    pub async fn set(&self, text: &str, model: &str, vector: Vec<f32>) {
        let key = self.key(model, text);
        self.put_local(key.clone(), vector.clone()).await;

        if let Some(remote) = &self.remote {
            let entry = CachedEmbedding::new(vector, model);
            if let Err(err) = remote.set(&key, &entry, self.config.ttl()).await {
                tracing::warn!(
                    target: TRACING_TARGET_CACHE,
                    key = %key,
                    error = %err,
                    "Distributed cache write failed"
                );
            }
        }
    }

    /// Looks up a batch, returning one slot per input in input order.
    pub async fn get_batch(&self, texts: &[String], model: &str) -> Vec<Option<Vec<f32>>> {
        let mut slots = Vec::with_capacity(texts.len());
        for text in texts {
            slots.push(self.get(text, model).await);
        }

        tracing::debug!(
            target: TRACING_TARGET_CACHE,
            model = %model,
            total = texts.len(),
            hits = slots.iter().filter(|s| s.is_some()).count(),
            "Cache batch lookup"
        );
        slots
    }

    /// Stores a batch of vectors in both tiers.
    pub async fn set_batch(&self, texts: &[String], model: &str, vectors: &[Vec<f32>]) {
        for (text, vector) in texts.iter().zip(vectors) {
            self.set(text, model, vector.clone()).await;
        }
    }

    async fn get_local(&self, key: &str) -> Option<Vec<f32>> {
        let now = Instant::now();
        {
            let local = self.local.read().await;
            match local.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.vector.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.local.write().await.remove(key);
        None
    }

    async fn put_local(&self, key: String, vector: Vec<f32>) {
        let max = self.config.cache_max_local_size;
        if max == 0 {
            return;
        }

        let mut local = self.local.write().await;
        if local.len() >= max && !local.contains_key(&key) {
            let now = Instant::now();
            local.retain(|_, entry| entry.expires_at > now);

            if local.len() >= max {
                let evict: Vec<String> = local.keys().take(local.len() / 2 + 1).cloned().collect();
                for k in &evict {
                    local.remove(k);
                }
                tracing::debug!(
                    target: TRACING_TARGET_CACHE,
                    evicted = evict.len(),
                    remaining = local.len(),
                    "Local cache full, evicted half"
                );
            }
        }

        local.insert(
            key,
            LocalEntry {
                vector,
                expires_at: Instant::now() + self.config.ttl(),
            },
        );
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("config", &self.config)
            .field("remote", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

/// In-process [`CacheTier`] with TTL, for single-node deployments and tests.
#[derive(Default)]
pub struct MemoryCacheTier {
    entries: Mutex<HashMap<String, (CachedEmbedding, Instant)>>,
}

impl MemoryCacheTier {
    /// Creates an empty tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns whether the tier holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheTier for MemoryCacheTier {
    async fn get(&self, key: &str) -> Result<Option<CachedEmbedding>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((entry, expires_at)) if *expires_at > Instant::now() => Ok(Some(entry.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &CachedEmbedding, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), (value.clone(), expires_at));
        Ok(())
    }
}

/// Wraps a provider so repeated texts are served from an [`EmbeddingCache`].
///
/// Only cache misses reach the wrapped provider, in a single batch; the
/// returned batch preserves input order.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
}

impl CachedEmbeddingProvider {
    /// Wraps `inner` with `cache`.
    pub fn new(inner: Arc<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }

    /// Returns the underlying cache.
    #[inline]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_request(texts).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.inner.model().to_owned();
        let mut slots = self.cache.get_batch(texts, &model).await;

        let misses: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.is_none().then_some(i))
            .collect();

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let embedded = self.inner.embed_batch(&miss_texts).await?;
            if embedded.len() != miss_texts.len() {
                return Err(Error::embedding(
                    self.inner.provider_name(),
                    format!("expected {} vectors, got {}", miss_texts.len(), embedded.len()),
                ));
            }

            self.cache.set_batch(&miss_texts, &model, &embedded).await;
            for (slot_index, vector) in misses.into_iter().zip(embedded) {
                slots[slot_index] = Some(vector);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| Error::embedding(self.inner.provider_name(), "missing vector"))
            })
            .collect()
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embedding::HashingEmbedder;

    /// Counts texts that reach the wrapped provider.
    struct CountingProvider {
        inner: HashingEmbedder,
        texts_embedded: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                inner: HashingEmbedder::new(16).unwrap(),
                texts_embedded: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_request(texts).await
        }

        fn model(&self) -> &str {
            "counting"
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cache_key_format() {
        let key = cache_key("emb:", "text-embedding-3-small", "hello");
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(key, "emb:text-embedding-3-small:2cf24dba5fb0a30e");
    }

    #[tokio::test]
    async fn test_get_after_set_returns_vector() {
        let cache = EmbeddingCache::new(EmbeddingCacheConfig::default());
        assert!(cache.get("hello", "m").await.is_none());

        cache.set("hello", "m", vec![1.0, 2.0]).await;
        assert_eq!(cache.get("hello", "m").await, Some(vec![1.0, 2.0]));
        assert!(cache.get("hello", "other-model").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_removes_about_half() {
        let config = EmbeddingCacheConfig::default().with_max_local_size(10);
        let cache = EmbeddingCache::new(config);

        for i in 0..10 {
            cache.set(&format!("text {i}"), "m", vec![i as f32]).await;
        }
        assert_eq!(cache.local_len().await, 10);

        cache.set("one more", "m", vec![0.5]).await;
        let len = cache.local_len().await;
        assert!(len <= 6, "expected roughly half evicted, got {len}");
        assert_eq!(cache.get("one more", "m").await, Some(vec![0.5]));
    }

    #[tokio::test]
    async fn test_expired_local_entries_are_misses() {
        let config = EmbeddingCacheConfig::default().with_ttl(Duration::ZERO);
        let cache = EmbeddingCache::new(config);
        cache.set("hello", "m", vec![1.0]).await;
        assert!(cache.get("hello", "m").await.is_none());
    }

    #[tokio::test]
    async fn test_distributed_hit_populates_local() {
        let remote = Arc::new(MemoryCacheTier::new());
        let writer = EmbeddingCache::new(EmbeddingCacheConfig::default()).with_remote(remote.clone());
        writer.set("shared", "m", vec![3.0]).await;
        assert_eq!(remote.len().await, 1);

        let reader = EmbeddingCache::new(EmbeddingCacheConfig::default()).with_remote(remote);
        assert_eq!(reader.local_len().await, 0);
        assert_eq!(reader.get("shared", "m").await, Some(vec![3.0]));
        assert_eq!(reader.local_len().await, 1);
    }

    #[tokio::test]
    async fn test_cached_provider_skips_hits() {
        let counting = Arc::new(CountingProvider::new());
        let cache = Arc::new(EmbeddingCache::new(EmbeddingCacheConfig::default()));
        let provider = CachedEmbeddingProvider::new(counting.clone(), cache);

        let first = provider.embed_batch(&texts(&["a b", "c d"])).await.unwrap();
        assert_eq!(counting.texts_embedded.load(Ordering::SeqCst), 2);

        let second = provider
            .embed_batch(&texts(&["c d", "e f", "a b"]))
            .await
            .unwrap();
        assert_eq!(counting.texts_embedded.load(Ordering::SeqCst), 3);

        assert_eq!(second[0], first[1]);
        assert_eq!(second[2], first[0]);
        assert_eq!(second[1], counting.inner.embed("e f").await.unwrap());
    }

    #[tokio::test]
    async fn test_cached_single_embed_is_idempotent() {
        let counting = Arc::new(CountingProvider::new());
        let cache = Arc::new(EmbeddingCache::new(EmbeddingCacheConfig::default()));
        let provider = CachedEmbeddingProvider::new(counting.clone(), cache);

        let a = provider.embed("retrieval").await.unwrap();
        let b = provider.embed("retrieval").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(counting.texts_embedded.load(Ordering::SeqCst), 1);
    }
}
