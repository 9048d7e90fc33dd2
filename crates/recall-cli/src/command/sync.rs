//! `recall sync`.

use anyhow::Context;
use clap::Args;
use recall_core::index::IncrementalIndexer;
use uuid::Uuid;

use super::print_json;
use crate::TRACING_TARGET_COMMAND;
use crate::config::{Cli, QueueMode, create_services};
use crate::shutdown::cancel_on_shutdown;

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Knowledge base to sync
    #[arg(long = "kb")]
    pub knowledge_base_id: Uuid,
}

impl SyncArgs {
    /// Re-embeds the changed chunks of every document and prints the report.
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = create_services(cli, QueueMode::Inline).await?;
        let indexer = IncrementalIndexer::new(services.retrieval.clone());

        let (cancel, signal) = cancel_on_shutdown();
        let report = indexer
            .sync_knowledge_base(self.knowledge_base_id, &cancel)
            .await
            .with_context(|| format!("failed to sync knowledge base {}", self.knowledge_base_id))?;
        signal.abort();

        if !report.failed.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_COMMAND,
                knowledge_base_id = %report.knowledge_base_id,
                failed = report.failed.len(),
                "Some documents failed to sync"
            );
        }

        print_json(&report)
    }
}
