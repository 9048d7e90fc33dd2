//! `recall worker`.

use anyhow::Context;
use clap::Args;
use recall_nats::WorkerConfig;
use serde_json::json;

use super::print_json;
use crate::config::{Cli, QueueMode, create_services};
use crate::shutdown::cancel_on_shutdown;
use crate::TRACING_TARGET_SHUTDOWN;

#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    #[clap(flatten)]
    pub worker: WorkerConfig,
}

impl WorkerArgs {
    /// Consumes the document work queue until SIGINT or SIGTERM.
    ///
    /// A document in flight at shutdown is cancelled and returned to the queue
    /// for immediate redelivery.
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = create_services(cli, QueueMode::Nats).await?;
        let nats = services
            .nats
            .as_ref()
            .context("the worker requires a NATS connection")?;
        let worker = nats
            .document_worker(self.worker.clone())
            .await
            .context("failed to create document worker")?;

        let (cancel, signal) = cancel_on_shutdown();
        let retrieval = services.retrieval.clone();
        let job_cancel = cancel.clone();
        let stats = worker
            .run(
                move |job| {
                    let retrieval = retrieval.clone();
                    let cancel = job_cancel.clone();
                    async move {
                        retrieval
                            .process_document(job.document_id, &cancel)
                            .await
                            .map(|_| ())
                    }
                },
                cancel,
            )
            .await
            .context("document worker failed")?;
        signal.abort();

        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            completed = stats.completed,
            retried = stats.retried,
            rejected = stats.rejected,
            "Worker shut down"
        );

        print_json(&json!({
            "completed": stats.completed,
            "retried": stats.retried,
            "rejected": stats.rejected,
        }))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::command::Command;

    #[test]
    fn test_worker_defaults() {
        let cli = Cli::try_parse_from(["recall", "--postgres-url", "postgresql://localhost/recall", "worker"])
            .unwrap();
        let Command::Worker(args) = cli.command else {
            panic!("expected worker command");
        };
        assert_eq!(args.worker, WorkerConfig::default());
    }

    #[test]
    fn test_worker_overrides() {
        let cli = Cli::try_parse_from([
            "recall",
            "--postgres-url",
            "postgresql://localhost/recall",
            "worker",
            "--worker-batch-size",
            "4",
            "--worker-max-deliver",
            "3",
        ])
        .unwrap();
        let Command::Worker(args) = cli.command else {
            panic!("expected worker command");
        };
        assert_eq!(args.worker.worker_batch_size, 4);
        assert_eq!(args.worker.worker_max_deliver, 3);
        assert!(args.worker.validate().is_ok());
    }
}
