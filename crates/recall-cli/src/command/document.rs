//! `recall upload` and `recall delete-document`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use recall_core::retrieval::UploadRequest;
use serde_json::json;
use uuid::Uuid;

use super::knowledge_base::document_summary;
use super::print_json;
use crate::TRACING_TARGET_COMMAND;
use crate::config::{Cli, QueueMode, create_services};
use crate::shutdown::cancel_on_shutdown;

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// File to upload; the extension selects the parser
    pub path: PathBuf,

    /// Target knowledge base
    #[arg(long = "kb")]
    pub knowledge_base_id: Uuid,

    /// Owning tenant
    #[arg(long, env = "RECALL_TENANT_ID")]
    pub tenant: Uuid,

    /// Document title; defaults to the file name
    #[arg(long)]
    pub title: Option<String>,

    /// JSON object stored with the document
    #[arg(long, value_parser = parse_metadata)]
    pub metadata: Option<serde_json::Value>,

    /// Process the document in this process instead of queueing it for workers
    #[arg(long, default_value_t = false)]
    pub inline: bool,
}

/// Parses `--metadata` as a JSON object.
fn parse_metadata(raw: &str) -> Result<serde_json::Value, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if !value.is_object() {
        return Err("metadata must be a JSON object".to_owned());
    }
    Ok(value)
}

impl UploadArgs {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("{} is not a file path", self.path.display()))?;
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        let mode = if self.inline { QueueMode::Inline } else { QueueMode::Nats };
        let mut services = create_services(cli, mode).await?;

        let mut request = UploadRequest::new(self.knowledge_base_id, self.tenant, file_name, bytes);
        if let Some(title) = &self.title {
            request = request.with_title(title.clone());
        }
        if let Some(metadata) = &self.metadata {
            request = request.with_metadata(metadata.clone());
        }

        let document = services
            .retrieval
            .upload(request)
            .await
            .context("failed to upload document")?;

        let Some(jobs) = services.inline_jobs.as_mut() else {
            return print_json(&document_summary(&document));
        };

        let (cancel, signal) = cancel_on_shutdown();
        while let Ok(job) = jobs.try_recv() {
            let chunks = services
                .retrieval
                .process_document(job.document_id, &cancel)
                .await
                .with_context(|| format!("failed to process document {}", job.document_id))?;
            tracing::info!(
                target: TRACING_TARGET_COMMAND,
                document_id = %job.document_id,
                chunks,
                "Document processed inline"
            );
        }
        signal.abort();

        let document = services
            .retrieval
            .deps()
            .documents
            .find_document(document.id)
            .await?
            .with_context(|| format!("document {} disappeared", document.id))?;
        print_json(&document_summary(&document))
    }
}

#[derive(Debug, Clone, Args)]
pub struct DeleteDocumentArgs {
    /// Document id
    pub id: Uuid,
}

impl DeleteDocumentArgs {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = create_services(cli, QueueMode::Inline).await?;
        services
            .retrieval
            .delete_document(self.id)
            .await
            .context("failed to delete document")?;

        print_json(&json!({ "deleted": self.id }))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::command::Command;

    #[test]
    fn test_upload_arguments() {
        let cli = Cli::try_parse_from([
            "recall",
            "--postgres-url",
            "postgresql://localhost/recall",
            "upload",
            "docs/guide.md",
            "--kb",
            "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e10",
            "--tenant",
            "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e11",
            "--metadata",
            r#"{"source":"wiki"}"#,
        ])
        .unwrap();

        let Command::Upload(args) = cli.command else {
            panic!("expected upload command");
        };
        assert_eq!(args.path, PathBuf::from("docs/guide.md"));
        assert_eq!(args.metadata, Some(json!({"source": "wiki"})));
        assert!(args.title.is_none());
        assert!(!args.inline);
    }

    #[test]
    fn test_upload_rejects_malformed_metadata() {
        for metadata in ["{source:wiki}", r#""wiki""#, "[1, 2]"] {
            let result = Cli::try_parse_from([
                "recall",
                "--postgres-url",
                "postgresql://localhost/recall",
                "upload",
                "notes.txt",
                "--kb",
                "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e10",
                "--tenant",
                "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e11",
                "--metadata",
                metadata,
            ]);
            assert!(result.is_err(), "{metadata} should be rejected");
        }
    }

    #[test]
    fn test_upload_rejects_invalid_knowledge_base_id() {
        let result = Cli::try_parse_from([
            "recall",
            "--postgres-url",
            "postgresql://localhost/recall",
            "upload",
            "notes.txt",
            "--kb",
            "not-a-uuid",
            "--tenant",
            "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e11",
        ]);
        assert!(result.is_err());
    }
}
