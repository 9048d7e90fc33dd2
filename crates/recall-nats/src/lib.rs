#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! NATS JetStream transport for recall.
//!
//! - [`NatsDocumentQueue`] publishes processing jobs to a work-queue stream
//!   and implements [`recall_core::queue::DocumentQueue`].
//! - [`DocumentWorker`] pulls those jobs, acks on success and naks with a
//!   delay on retryable failures.
//! - [`NatsEmbeddingCache`] is a JetStream KV bucket implementing the
//!   distributed tier of the embedding cache.

/// Tracing target for NATS client operations.
pub const TRACING_TARGET_CLIENT: &str = "recall_nats::client";

/// Tracing target for connection establishment.
pub const TRACING_TARGET_CONNECTION: &str = "recall_nats::connection";

/// Tracing target for the document work queue and its worker.
pub const TRACING_TARGET_QUEUE: &str = "recall_nats::queue";

/// Tracing target for key-value operations.
pub const TRACING_TARGET_KV: &str = "recall_nats::kv";

mod client;
mod error;
pub mod kv;
pub mod queue;

pub use async_nats::jetstream;
pub use client::{NatsClient, NatsConfig};
pub use error::{Error, Result};
pub use kv::NatsEmbeddingCache;
pub use queue::{DocumentWorker, NatsDocumentQueue, WorkerConfig};
