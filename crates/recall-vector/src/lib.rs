#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Vector store backends for recall.
//!
//! Both backends implement [`recall_core::store::VectorStore`] with the same
//! contract: every operation is scoped by knowledge base, deleted chunks never
//! appear in search, listing or statistics, and scores are cosine similarity.
//!
//! - [`PgVectorStore`] keeps chunks in the `document_chunks` table and orders
//!   by pgvector cosine distance. It also implements keyword search with
//!   PostgreSQL full-text ranking.
//! - [`QdrantVectorStore`] talks to the Qdrant REST API, one point per chunk.

pub mod pgvector;
pub mod qdrant;

mod config;
mod error;

pub use config::VectorBackend;
pub use error::{VectorError, VectorResult};
pub use pgvector::PgVectorStore;
pub use qdrant::{QdrantConfig, QdrantVectorStore};

/// Tracing target for the pgvector backend.
pub const TRACING_TARGET_PGVECTOR: &str = "recall_vector::pgvector";

/// Tracing target for the Qdrant backend.
pub const TRACING_TARGET_QDRANT: &str = "recall_vector::qdrant";
