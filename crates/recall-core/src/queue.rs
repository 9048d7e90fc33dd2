//! Document-processing queue contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Error, Result};

/// Job payload: `{"document_id": "<uuid>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDocumentJob {
    pub document_id: Uuid,
}

impl ProcessDocumentJob {
    /// Creates a job for the given document.
    pub fn new(document_id: Uuid) -> Self {
        Self { document_id }
    }
}

/// Hands documents to asynchronous processing.
///
/// Delivery is at least once; consumers must tolerate duplicates.
#[async_trait]
pub trait DocumentQueue: Send + Sync {
    /// Enqueues a processing job for `document_id`.
    async fn enqueue_process_document(&self, document_id: Uuid) -> Result<()>;
}

/// In-process queue backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<ProcessDocumentJob>,
}

impl ChannelQueue {
    /// Creates a queue and the receiver its jobs are delivered to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessDocumentJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DocumentQueue for ChannelQueue {
    async fn enqueue_process_document(&self, document_id: Uuid) -> Result<()> {
        self.sender
            .send(ProcessDocumentJob::new(document_id))
            .map_err(|_| Error::queue("processing queue receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_payload_shape() {
        let id = Uuid::from_u128(1);
        let json = serde_json::to_string(&ProcessDocumentJob::new(id)).unwrap();
        assert_eq!(
            json,
            r#"{"document_id":"00000000-0000-0000-0000-000000000001"}"#
        );
    }

    #[tokio::test]
    async fn test_channel_queue_delivers_and_reports_closed() {
        let (queue, mut receiver) = ChannelQueue::new();
        let id = Uuid::new_v4();
        queue.enqueue_process_document(id).await.unwrap();
        assert_eq!(receiver.recv().await.unwrap().document_id, id);

        drop(receiver);
        assert!(queue.enqueue_process_document(id).await.is_err());
    }
}
