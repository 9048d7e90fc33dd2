//! Qdrant backend.
//!
//! Talks to the REST API with JSON bodies: collection creation with cosine
//! distance, point upserts carrying the chunk as payload, filtered search,
//! and deletion by id or by payload filter.

mod config;
mod store;
mod wire;

pub use config::{DEFAULT_COLLECTION, QdrantConfig};
pub use store::QdrantVectorStore;
