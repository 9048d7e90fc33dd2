//! JetStream key-value stores.

mod embedding_cache;

pub use embedding_cache::{EMBEDDING_BUCKET, NatsEmbeddingCache, kv_key};
