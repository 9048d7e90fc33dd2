//! `recall kb ...`.

use anyhow::Context;
use clap::{Args, Subcommand};
use recall_core::model::{Document, KnowledgeBase};
use recall_postgres::PgClient;
use recall_postgres::model::NewKnowledgeBase;
use recall_postgres::query::KnowledgeBaseQueries;
use serde_json::json;
use uuid::Uuid;

use super::print_json;
use crate::TRACING_TARGET_COMMAND;
use crate::config::{Cli, QueueMode, create_services};

/// Knowledge-base management.
#[derive(Debug, Clone, Subcommand)]
pub enum KnowledgeBaseCommand {
    /// Create a knowledge base bound to the configured embedding model.
    Create(CreateArgs),
    /// List the live knowledge bases of a tenant.
    List(TenantArgs),
    /// Show one knowledge base with its counters.
    Show(KnowledgeBaseArgs),
    /// List the documents of a knowledge base.
    Documents(KnowledgeBaseArgs),
    /// Delete a knowledge base and all of its vectors.
    Delete(KnowledgeBaseArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Owning tenant
    #[arg(long, env = "RECALL_TENANT_ID")]
    pub tenant: Uuid,

    /// Display name
    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct TenantArgs {
    /// Owning tenant
    #[arg(long, env = "RECALL_TENANT_ID")]
    pub tenant: Uuid,
}

#[derive(Debug, Clone, Args)]
pub struct KnowledgeBaseArgs {
    /// Knowledge base id
    pub id: Uuid,
}

impl KnowledgeBaseCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match self {
            KnowledgeBaseCommand::Create(args) => create(cli, args).await,
            KnowledgeBaseCommand::List(args) => list(cli, args.tenant).await,
            KnowledgeBaseCommand::Show(args) => show(cli, args.id).await,
            KnowledgeBaseCommand::Documents(args) => documents(cli, args.id).await,
            KnowledgeBaseCommand::Delete(args) => delete(cli, args.id).await,
        }
    }
}

fn postgres(cli: &Cli) -> anyhow::Result<PgClient> {
    PgClient::new(cli.postgres.clone()).context("failed to create postgres client")
}

async fn create(cli: &Cli, args: &CreateArgs) -> anyhow::Result<()> {
    if args.name.trim().is_empty() {
        anyhow::bail!("knowledge base name must not be empty");
    }

    let postgres = postgres(cli)?;
    let mut conn = postgres.get_connection().await?;
    let model = cli.embedding.model_name();
    let knowledge_base = conn
        .create_knowledge_base(NewKnowledgeBase::new(args.tenant, args.name.trim(), &model))
        .await
        .context("failed to create knowledge base")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        knowledge_base_id = %knowledge_base.id,
        tenant_id = %args.tenant,
        embedding_model = %model,
        "Knowledge base created"
    );

    print_json(&KnowledgeBase::from(knowledge_base))
}

async fn list(cli: &Cli, tenant: Uuid) -> anyhow::Result<()> {
    let postgres = postgres(cli)?;
    let mut conn = postgres.get_connection().await?;
    let knowledge_bases: Vec<KnowledgeBase> = conn
        .list_tenant_knowledge_bases(tenant)
        .await
        .context("failed to list knowledge bases")?
        .into_iter()
        .map(Into::into)
        .collect();

    print_json(&knowledge_bases)
}

async fn show(cli: &Cli, id: Uuid) -> anyhow::Result<()> {
    let postgres = postgres(cli)?;
    let mut conn = postgres.get_connection().await?;
    let knowledge_base = conn
        .find_knowledge_base_by_id(id)
        .await
        .context("failed to load knowledge base")?
        .filter(|kb| kb.deleted_at.is_none())
        .with_context(|| format!("knowledge base {id} not found"))?;

    print_json(&KnowledgeBase::from(knowledge_base))
}

async fn documents(cli: &Cli, id: Uuid) -> anyhow::Result<()> {
    let services = create_services(cli, QueueMode::Inline).await?;
    let knowledge_base = services.retrieval.require_knowledge_base(id).await?;
    let documents = services
        .retrieval
        .deps()
        .documents
        .list_documents(knowledge_base.id)
        .await
        .context("failed to list documents")?;

    let summaries: Vec<_> = documents.iter().map(document_summary).collect();
    print_json(&summaries)
}

async fn delete(cli: &Cli, id: Uuid) -> anyhow::Result<()> {
    let services = create_services(cli, QueueMode::Inline).await?;
    services
        .retrieval
        .delete_knowledge_base(id)
        .await
        .context("failed to delete knowledge base")?;

    print_json(&json!({ "deleted": id }))
}

/// Document fields without the extracted content.
pub(super) fn document_summary(document: &Document) -> serde_json::Value {
    json!({
        "id": document.id,
        "knowledge_base_id": document.knowledge_base_id,
        "title": document.title,
        "file_name": document.file_name,
        "status": document.status,
        "error_message": document.error_message,
        "chunk_count": document.chunk_count,
        "char_count": document.char_count,
        "byte_size": document.byte_size,
        "content_hash": document.content_hash,
        "metadata": document.metadata,
        "created_at": document.created_at,
        "indexed_at": document.indexed_at,
    })
}
