//! Embedding providers and the embedding cache.

mod cache;
mod hashing;
mod openai;
mod provider;

pub use cache::{
    CacheTier, CachedEmbedding, CachedEmbeddingProvider, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL,
    DEFAULT_MAX_LOCAL_SIZE, EmbeddingCache, EmbeddingCacheConfig, MemoryCacheTier, cache_key,
};
pub use hashing::{HASHING_PROVIDER_NAME, HashingEmbedder};
pub use openai::{OPENAI_PROVIDER_NAME, OpenAiEmbedder, OpenAiEmbedderConfig};
pub use provider::{DEFAULT_MAX_BATCH_SIZE, EmbeddingProvider, embed_batch_cancellable};
