#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! `recall` command-line interface.
//!
//! One binary for operating a recall deployment: database migrations,
//! knowledge-base management, document upload, the queue worker, incremental
//! sync and search.

mod command;
mod config;
mod shutdown;

use std::process;

use anyhow::Context;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "recall_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "recall_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "recall_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "recall_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing(cli.log_format);
    cli.log();
    cli.validate().context("invalid configuration")?;

    cli.command.execute(&cli).await
}
