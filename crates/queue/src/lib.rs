//! Inbound/outbound queue client seam (spec §4.6, §6), backed by
//! `aws-sdk-sqs`. A trait so the orchestrator can be driven by a fake queue
//! in tests.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use realtor_core::UrlTask;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("receive_message failed: {0}")]
    Receive(String),
    #[error("delete_message failed: {0}")]
    Delete(String),
    #[error("send_message_batch failed: {0}")]
    SendBatch(String),
}

#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Sends up to 10 entries as a single `SendMessageBatch` call (spec §6).
    async fn send_batch(&self, message_bodies: &[String]) -> Result<(), QueueError>;
}

pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_seconds)
            .visibility_timeout(visibility_timeout_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        Ok(resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let body = m.body?;
                let receipt_handle = m.receipt_handle?;
                Some(ReceivedMessage { body, receipt_handle })
            })
            .collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.to_string()))?;
        Ok(())
    }

    async fn send_batch(&self, message_bodies: &[String]) -> Result<(), QueueError> {
        if message_bodies.is_empty() {
            return Ok(());
        }
        let entries = message_bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                aws_sdk_sqs::types::SendMessageBatchRequestEntry::builder()
                    .id(i.to_string())
                    .message_body(body)
                    .build()
                    .expect("id and message_body are always set")
            })
            .collect::<Vec<_>>();

        self.client
            .send_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| QueueError::SendBatch(e.to_string()))?;
        Ok(())
    }
}

/// Parses an inbound message body into a [`UrlTask`]. Unknown keys are
/// ignored by `serde`'s default behavior; a body missing `url_to_scrape`
/// (or that isn't valid JSON) returns `None` — callers must delete such
/// messages to stop redelivery (spec §6, §7).
pub fn parse_url_task(body: &str) -> Option<UrlTask> {
    match serde_json::from_str::<UrlTask>(body) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!(error = %e, "malformed queue body");
            None
        }
    }
}
