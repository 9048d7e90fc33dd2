#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Retrieval-and-indexing engine for multi-tenant knowledge bases.
//!
//! Documents are parsed, split into overlapping chunks, embedded and written
//! to a pluggable [`VectorStore`]. Queries go through vector search, optional
//! keyword search with reciprocal rank fusion, optional reranking and a score
//! threshold. The [`IncrementalIndexer`] keeps stored vectors consistent with
//! changed documents by re-embedding only the chunks whose content hash moved.
//!
//! [`VectorStore`]: store::VectorStore
//! [`IncrementalIndexer`]: index::IncrementalIndexer

// Tracing target constants for consistent logging.

/// Tracing target for document chunking.
pub const TRACING_TARGET_CHUNKER: &str = "recall_core::chunker";

/// Tracing target for embedding providers.
pub const TRACING_TARGET_EMBEDDING: &str = "recall_core::embedding";

/// Tracing target for the two-tier embedding cache.
pub const TRACING_TARGET_CACHE: &str = "recall_core::cache";

/// Tracing target for vector store operations.
pub const TRACING_TARGET_STORE: &str = "recall_core::store";

/// Tracing target for keyword search, fusion and reranking.
pub const TRACING_TARGET_SEARCH: &str = "recall_core::search";

/// Tracing target for the upload, process and query pipelines.
pub const TRACING_TARGET_RETRIEVAL: &str = "recall_core::retrieval";

/// Tracing target for incremental re-indexing.
pub const TRACING_TARGET_INDEXER: &str = "recall_core::indexer";

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod model;
pub mod parser;
pub mod queue;
pub mod repository;
pub mod retrieval;
pub mod search;
pub mod store;

mod error;

pub use error::{Error, Result};
