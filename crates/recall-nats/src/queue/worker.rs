//! Pull-consumer worker for document jobs.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::consumer::{self, PullConsumer};
use async_nats::jetstream::{AckKind, Message};
#[cfg(feature = "config")]
use clap::Args;
use futures::StreamExt;
use recall_core::queue::ProcessDocumentJob;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::publisher::{DOCUMENT_STREAM, NatsDocumentQueue, PROCESS_DOCUMENT_SUBJECT};
use crate::{Error, Result, TRACING_TARGET_QUEUE};

/// Configuration for [`DocumentWorker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct WorkerConfig {
    /// Durable consumer name shared by all workers
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-consumer", env = "WORKER_CONSUMER", default_value = "recall-document-worker")
    )]
    pub worker_consumer: String,

    /// Jobs fetched per pull
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-batch-size", env = "WORKER_BATCH_SIZE", default_value = "10")
    )]
    pub worker_batch_size: usize,

    /// Deliveries before a job is dropped
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-max-deliver", env = "WORKER_MAX_DELIVER", default_value = "5")
    )]
    pub worker_max_deliver: i64,

    /// Seconds a job may run before it is redelivered
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-ack-wait-secs", env = "WORKER_ACK_WAIT_SECS", default_value = "300")
    )]
    pub worker_ack_wait_secs: u64,

    /// Base redelivery delay in seconds, multiplied by the delivery count
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-retry-delay-secs", env = "WORKER_RETRY_DELAY_SECS", default_value = "10")
    )]
    pub worker_retry_delay_secs: u64,

    /// Pause in seconds after an empty pull
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-idle-secs", env = "WORKER_IDLE_SECS", default_value = "2")
    )]
    pub worker_idle_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_consumer: "recall-document-worker".to_owned(),
            worker_batch_size: 10,
            worker_max_deliver: 5,
            worker_ack_wait_secs: 300,
            worker_retry_delay_secs: 10,
            worker_idle_secs: 2,
        }
    }
}

impl WorkerConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.worker_consumer.is_empty() {
            return Err(Error::invalid_config("worker consumer name cannot be empty"));
        }
        if self.worker_batch_size == 0 {
            return Err(Error::invalid_config("worker batch size must be positive"));
        }
        if self.worker_max_deliver < 1 {
            return Err(Error::invalid_config("worker max deliver must be at least 1"));
        }
        Ok(())
    }

    /// Decides how a finished delivery is acknowledged.
    pub fn disposition(&self, outcome: &recall_core::Result<()>, delivered: i64) -> Disposition {
        match outcome {
            Ok(()) => Disposition::Ack,
            Err(recall_core::Error::Cancelled) => Disposition::Retry(Duration::ZERO),
            Err(err) if !err.is_retryable() => Disposition::Reject,
            Err(_) if delivered >= self.worker_max_deliver => Disposition::Reject,
            Err(_) => {
                let attempts = delivered.max(1) as u64;
                Disposition::Retry(Duration::from_secs(self.worker_retry_delay_secs * attempts))
            }
        }
    }
}

/// How a delivered job is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done; remove from the stream.
    Ack,
    /// Redeliver after the delay.
    Retry(Duration),
    /// Never redeliver.
    Reject,
}

impl Disposition {
    fn ack_kind(self) -> AckKind {
        match self {
            Disposition::Ack => AckKind::Ack,
            Disposition::Retry(delay) if delay.is_zero() => AckKind::Nak(None),
            Disposition::Retry(delay) => AckKind::Nak(Some(delay)),
            Disposition::Reject => AckKind::Term,
        }
    }
}

/// Counters of one [`DocumentWorker::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub retried: u64,
    pub rejected: u64,
}

/// Consumes document jobs with a durable pull consumer.
///
/// Several workers sharing the consumer name split the queue between them.
pub struct DocumentWorker {
    consumer: PullConsumer,
    config: WorkerConfig,
}

impl DocumentWorker {
    /// Gets or creates the durable consumer on the document stream.
    #[tracing::instrument(skip(queue), target = TRACING_TARGET_QUEUE)]
    pub async fn new(queue: &NatsDocumentQueue, config: WorkerConfig) -> Result<Self> {
        config.validate()?;

        let stream = queue
            .jetstream()
            .get_stream(DOCUMENT_STREAM)
            .await
            .map_err(|e| Error::stream_error(DOCUMENT_STREAM, e.to_string()))?;

        let consumer_config = consumer::pull::Config {
            durable_name: Some(config.worker_consumer.clone()),
            description: Some("Recall document processing worker".to_owned()),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: Duration::from_secs(config.worker_ack_wait_secs),
            max_deliver: config.worker_max_deliver,
            filter_subject: PROCESS_DOCUMENT_SUBJECT.to_owned(),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(&config.worker_consumer, consumer_config)
            .await
            .map_err(|e| Error::consumer_error(&config.worker_consumer, e.to_string()))?;

        tracing::info!(
            target: TRACING_TARGET_QUEUE,
            consumer = %config.worker_consumer,
            batch_size = config.worker_batch_size,
            "Document worker ready"
        );

        Ok(Self { consumer, config })
    }

    /// Returns the worker configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Pulls and handles jobs until `cancel` fires.
    ///
    /// Jobs are handled one at a time in delivery order. A job in flight when
    /// `cancel` fires is naked for immediate redelivery by the handler's
    /// cancellation error.
    pub async fn run<F, Fut>(&self, handler: F, cancel: CancellationToken) -> Result<WorkerStats>
    where
        F: Fn(ProcessDocumentJob) -> Fut,
        Fut: Future<Output = recall_core::Result<()>>,
    {
        let mut stats = WorkerStats::default();
        let idle = Duration::from_secs(self.config.worker_idle_secs);

        while !cancel.is_cancelled() {
            let batch = self.fetch().await?;
            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle) => continue,
                }
            }

            for message in batch {
                match self.handle(message, &handler).await? {
                    Disposition::Ack => stats.completed += 1,
                    Disposition::Retry(_) => stats.retried += 1,
                    Disposition::Reject => stats.rejected += 1,
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET_QUEUE,
            completed = stats.completed,
            retried = stats.retried,
            rejected = stats.rejected,
            "Document worker stopped"
        );
        Ok(stats)
    }

    async fn fetch(&self) -> Result<Vec<Message>> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.config.worker_batch_size)
            .messages()
            .await
            .map_err(|e| Error::operation("job_fetch", e.to_string()))?;

        let mut batch = Vec::with_capacity(self.config.worker_batch_size);
        while let Some(message) = messages.next().await {
            match message {
                Ok(message) => batch.push(message),
                Err(e) => {
                    tracing::warn!(target: TRACING_TARGET_QUEUE, error = %e, "Error receiving job");
                }
            }
        }
        Ok(batch)
    }

    async fn handle<F, Fut>(&self, message: Message, handler: &F) -> Result<Disposition>
    where
        F: Fn(ProcessDocumentJob) -> Fut,
        Fut: Future<Output = recall_core::Result<()>>,
    {
        let job: ProcessDocumentJob = match serde_json::from_slice(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(target: TRACING_TARGET_QUEUE, error = %e, "Malformed job payload");
                settle(&message, Disposition::Reject).await?;
                return Ok(Disposition::Reject);
            }
        };

        let delivered = message.info().map(|info| info.delivered).unwrap_or(1);
        let outcome = handler(job).await;
        let disposition = self.config.disposition(&outcome, delivered);

        match (&outcome, disposition) {
            (Ok(()), _) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    document_id = %job.document_id,
                    "Job completed"
                );
            }
            (Err(err), Disposition::Retry(delay)) => {
                tracing::warn!(
                    target: TRACING_TARGET_QUEUE,
                    document_id = %job.document_id,
                    delivered,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Job failed, will retry"
                );
            }
            (Err(err), _) => {
                tracing::error!(
                    target: TRACING_TARGET_QUEUE,
                    document_id = %job.document_id,
                    delivered,
                    error = %err,
                    "Job failed permanently"
                );
            }
        }

        settle(&message, disposition).await?;
        Ok(disposition)
    }
}

async fn settle(message: &Message, disposition: Disposition) -> Result<()> {
    message
        .ack_with(disposition.ack_kind())
        .await
        .map_err(|e| Error::operation("job_ack", e.to_string()))
}

impl std::fmt::Debug for DocumentWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(WorkerConfig::default().validate().is_ok());
        let config = WorkerConfig {
            worker_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_success_is_acked() {
        let config = WorkerConfig::default();
        assert_eq!(config.disposition(&Ok(()), 1), Disposition::Ack);
    }

    #[test]
    fn test_retry_delay_grows_with_deliveries() {
        let config = WorkerConfig::default();
        let failure = Err(recall_core::Error::vector_store("connection reset"));

        assert_eq!(
            config.disposition(&failure, 1),
            Disposition::Retry(Duration::from_secs(10))
        );
        assert_eq!(
            config.disposition(&failure, 3),
            Disposition::Retry(Duration::from_secs(30))
        );
        assert_eq!(config.disposition(&failure, 5), Disposition::Reject);
    }

    #[test]
    fn test_validation_errors_are_rejected() {
        let config = WorkerConfig::default();
        let missing = Err(recall_core::Error::DocumentNotFound(Uuid::new_v4()));
        assert_eq!(config.disposition(&missing, 1), Disposition::Reject);
        assert_eq!(
            config.disposition(&Err(recall_core::Error::EmptyContent), 1),
            Disposition::Reject
        );
    }

    #[test]
    fn test_cancelled_job_is_redelivered_immediately() {
        let config = WorkerConfig::default();
        let disposition = config.disposition(&Err(recall_core::Error::Cancelled), 2);
        assert_eq!(disposition, Disposition::Retry(Duration::ZERO));
        assert!(matches!(disposition.ack_kind(), AckKind::Nak(None)));
    }
}
