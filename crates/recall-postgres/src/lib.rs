#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! PostgreSQL persistence for recall.
//!
//! Provides a pooled [`PgClient`] with embedded migrations, diesel models for
//! knowledge bases, documents and document chunks, and query traits over the
//! pooled connection. [`PgClient`] implements the relational repository
//! traits of `recall-core`.

/// Embeds all migrations into the final binary.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("./migrations");

// Tracing target constants for consistent logging.

/// Tracing target for client initialization and configuration.
pub const TRACING_TARGET_CLIENT: &str = "recall_postgres::client";

/// Tracing target for query execution.
pub const TRACING_TARGET_QUERY: &str = "recall_postgres::queries";

/// Tracing target for migration runs.
pub const TRACING_TARGET_MIGRATION: &str = "recall_postgres::migrations";

/// Tracing target for connection establishment and pool management.
pub const TRACING_TARGET_CONNECTION: &str = "recall_postgres::connection";

mod client;
mod error;
pub mod model;
pub mod query;
mod repository;
pub mod schema;
pub mod types;

pub use diesel_async::AsyncPgConnection as PgConnection;

pub use crate::client::{
    ConnectionPool, MigrationResult, PgClient, PgClientMigrationExt, PgConfig, PgConn,
    PgPoolStatus, PooledConnection, get_applied_migrations, run_pending_migrations,
};
pub use crate::error::{PgError, PgResult};
