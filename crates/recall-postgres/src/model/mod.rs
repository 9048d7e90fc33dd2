//! Diesel models for every table, with conversions to the engine model.

mod document;
mod document_chunk;
mod knowledge_base;

pub use document::{Document, IndexedDocument, NewDocument};
pub use document_chunk::{DocumentChunk, NewDocumentChunk, ScoredDocumentChunk};
pub use knowledge_base::{KnowledgeBase, NewKnowledgeBase};
