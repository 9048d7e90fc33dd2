//! Query traits implemented for [`PgConnection`].
//!
//! Each trait groups the statements for one table. They are implemented on the
//! raw async connection, so they are available on a [`PgConn`] through deref.
//!
//! [`PgConnection`]: crate::PgConnection
//! [`PgConn`]: crate::PgConn

mod document;
mod document_chunk;
mod knowledge_base;

pub use document::DocumentQueries;
pub use document_chunk::{DocumentChunkQueries, DocumentChunkStats};
pub use knowledge_base::KnowledgeBaseQueries;

/// Current time in the column representation.
pub(crate) fn now() -> jiff_diesel::Timestamp {
    jiff::Timestamp::now().into()
}
