//! Document processing queue over a JetStream work-queue stream.

use async_nats::jetstream::{self, stream};
use async_trait::async_trait;
use recall_core::queue::{DocumentQueue, ProcessDocumentJob};
use uuid::Uuid;

use crate::{Error, Result, TRACING_TARGET_QUEUE};

/// Stream holding pending document jobs.
pub const DOCUMENT_STREAM: &str = "RECALL_DOCUMENTS";

/// Subject document jobs are published on.
pub const PROCESS_DOCUMENT_SUBJECT: &str = "recall.documents.process";

/// Publishes `{"document_id": ..}` jobs to [`DOCUMENT_STREAM`].
///
/// The stream uses work-queue retention: a job is removed once a worker
/// acknowledges it.
#[derive(Debug, Clone)]
pub struct NatsDocumentQueue {
    jetstream: jetstream::Context,
}

impl NatsDocumentQueue {
    /// Gets or creates the document stream.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_QUEUE)]
    pub async fn new(jetstream: &jetstream::Context) -> Result<Self> {
        let config = stream::Config {
            name: DOCUMENT_STREAM.to_owned(),
            description: Some("Recall document processing jobs".to_owned()),
            subjects: vec![PROCESS_DOCUMENT_SUBJECT.to_owned()],
            retention: stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        match jetstream.get_stream(DOCUMENT_STREAM).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = DOCUMENT_STREAM,
                    "Using existing document stream"
                );
            }
            Err(_) => {
                tracing::info!(
                    target: TRACING_TARGET_QUEUE,
                    stream = DOCUMENT_STREAM,
                    subject = PROCESS_DOCUMENT_SUBJECT,
                    "Creating document stream"
                );
                jetstream
                    .create_stream(config)
                    .await
                    .map_err(|e| Error::stream_error(DOCUMENT_STREAM, e.to_string()))?;
            }
        }

        Ok(Self {
            jetstream: jetstream.clone(),
        })
    }

    pub(crate) fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Publishes a job and waits for the stream to acknowledge it.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn publish(&self, job: ProcessDocumentJob) -> Result<()> {
        let payload = serde_json::to_vec(&job)?;

        self.jetstream
            .publish(PROCESS_DOCUMENT_SUBJECT, payload.into())
            .await
            .map_err(|e| Error::delivery_failed(PROCESS_DOCUMENT_SUBJECT, e.to_string()))?
            .await
            .map_err(|e| Error::delivery_failed(PROCESS_DOCUMENT_SUBJECT, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            document_id = %job.document_id,
            "Enqueued document for processing"
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentQueue for NatsDocumentQueue {
    async fn enqueue_process_document(&self, document_id: Uuid) -> recall_core::Result<()> {
        self.publish(ProcessDocumentJob::new(document_id))
            .await
            .map_err(Error::into_queue)
    }
}
