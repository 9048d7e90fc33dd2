//! `recall migrate`.

use anyhow::Context;
use recall_postgres::{PgClient, PgClientMigrationExt};
use serde_json::json;

use super::print_json;
use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// Applies pending migrations and prints the applied and total versions.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let postgres =
        PgClient::new(cli.postgres.clone()).context("failed to create postgres client")?;

    let result = postgres
        .run_pending_migrations()
        .await
        .context("failed to apply migrations")?;
    let applied = postgres
        .get_applied_migrations()
        .await
        .context("failed to list applied migrations")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        applied = result.applied_versions.len(),
        total = applied.len(),
        duration_ms = result.duration.as_millis() as u64,
        "Migrations complete"
    );

    print_json(&json!({
        "applied": result.applied_versions,
        "up_to_date": result.is_no_op(),
        "versions": applied,
    }))
}
