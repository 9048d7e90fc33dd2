//! Enumerations mapped to PostgreSQL enum types.

mod document_status;
mod knowledge_base_status;

pub use document_status::DocumentStatus;
pub use knowledge_base_status::KnowledgeBaseStatus;
