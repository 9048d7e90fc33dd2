//! Incremental re-indexing driven by chunk content hashes.

mod diff;
mod indexer;

pub use diff::{ChunkChange, ChunkDiff, diff_chunks};
pub use indexer::{ChangeType, DocumentSync, FailedDocument, IncrementalIndexer, SyncReport};
