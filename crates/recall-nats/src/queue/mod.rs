//! Document processing work queue.

mod publisher;
mod worker;

pub use publisher::{DOCUMENT_STREAM, NatsDocumentQueue, PROCESS_DOCUMENT_SUBJECT};
pub use worker::{Disposition, DocumentWorker, WorkerConfig, WorkerStats};
