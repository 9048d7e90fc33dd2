//! Subcommands.
//!
//! Every command prints its result to stdout as pretty JSON; logs go to stderr.

mod document;
mod knowledge_base;
mod migrate;
mod search;
mod sync;
mod worker;

use clap::Subcommand;
use serde::Serialize;

use self::document::{DeleteDocumentArgs, UploadArgs};
use self::knowledge_base::KnowledgeBaseCommand;
use self::search::SearchArgs;
use self::sync::SyncArgs;
use self::worker::WorkerArgs;
use crate::config::{Cli, QueueMode};

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,

    /// Manage knowledge bases.
    #[command(subcommand, name = "kb")]
    KnowledgeBase(KnowledgeBaseCommand),

    /// Upload a document into a knowledge base.
    Upload(UploadArgs),

    /// Delete a document and its vectors.
    DeleteDocument(DeleteDocumentArgs),

    /// Process queued documents until interrupted.
    Worker(WorkerArgs),

    /// Re-index the changed documents of a knowledge base.
    Sync(SyncArgs),

    /// Search one or more knowledge bases.
    Search(SearchArgs),
}

impl Command {
    /// Returns how the command's service queues uploaded documents.
    pub fn queue_mode(&self) -> QueueMode {
        match self {
            Command::Worker(_) => QueueMode::Nats,
            Command::Upload(args) if !args.inline => QueueMode::Nats,
            _ => QueueMode::Inline,
        }
    }

    /// Runs the command.
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        match self {
            Command::Migrate => migrate::run(cli).await,
            Command::KnowledgeBase(command) => command.run(cli).await,
            Command::Upload(args) => args.run(cli).await,
            Command::DeleteDocument(args) => args.run(cli).await,
            Command::Worker(args) => args.run(cli).await,
            Command::Sync(args) => args.run(cli).await,
            Command::Search(args) => args.run(cli).await,
        }
    }
}

/// Writes `value` to stdout as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["recall", "--postgres-url", "postgresql://localhost/recall"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_queue_mode() {
        assert_eq!(parse(&["worker"]).command.queue_mode(), QueueMode::Nats);
        assert_eq!(parse(&["migrate"]).command.queue_mode(), QueueMode::Inline);

        let kb = "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e10";
        let tenant = "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e11";
        let upload = ["upload", "notes.md", "--kb", kb, "--tenant", tenant];
        assert_eq!(parse(&upload).command.queue_mode(), QueueMode::Nats);

        let mut inline = upload.to_vec();
        inline.push("--inline");
        assert_eq!(parse(&inline).command.queue_mode(), QueueMode::Inline);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let result = Cli::try_parse_from(["recall", "--postgres-url", "x", "serve"]);
        assert!(result.is_err());
    }
}
