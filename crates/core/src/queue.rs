use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::request::SuggestionRequest;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
    #[error("receipt handle is no longer current: {0}")]
    StaleReceipt(String),
    #[error("could not encode request body: {0}")]
    Encode(String),
}

/// Opaque proof that the holder received the current delivery of a message.
/// Rotated on every receive; only the latest handle can acknowledge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

/// Envelope handed to the fulfillment worker. The worker owns it until it is
/// acknowledged or the visibility window lapses and the message becomes
/// redeliverable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
    pub receive_count: u32,
}

/// Durable, at-least-once channel carrying one message per completed request.
/// Ordering between messages is not guaranteed and consumers must tolerate
/// redelivery.
#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Enqueues a completed request; returns the new message id.
    async fn enqueue(&self, request: &SuggestionRequest) -> Result<String, QueueError>;

    /// Claims up to `max_messages` visible messages, hiding each for
    /// `visibility_timeout`. Long-polls up to `wait` when the queue is empty.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Deletes the message for the given receipt. Fails with `StaleReceipt`
    /// when the handle was rotated away by a later receive or the message is
    /// already gone.
    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;
}

const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
struct StoredMessage {
    message_id: String,
    receipt_handle: String,
    body: String,
    attributes: BTreeMap<String, String>,
    visible_at: Instant,
    receive_count: u32,
}

/// Process-local queue with real visibility semantics; backs the dialog
/// manager's unit tests and anything that does not need durability.
#[derive(Clone, Default)]
pub struct InMemoryRequestQueue {
    messages: Arc<Mutex<Vec<StoredMessage>>>,
}

impl InMemoryRequestQueue {
    pub fn pending_count(&self) -> usize {
        match self.messages.lock() {
            Ok(messages) => messages.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn claim(&self, max_messages: usize, visibility_timeout: Duration) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut claimed = Vec::new();
        for stored in messages.iter_mut() {
            if claimed.len() >= max_messages {
                break;
            }
            if stored.visible_at > now {
                continue;
            }

            stored.receipt_handle = Uuid::new_v4().to_string();
            stored.visible_at = now + visibility_timeout;
            stored.receive_count += 1;

            claimed.push(QueueMessage {
                message_id: stored.message_id.clone(),
                receipt_handle: ReceiptHandle(stored.receipt_handle.clone()),
                body: stored.body.clone(),
                attributes: stored.attributes.clone(),
                receive_count: stored.receive_count,
            });
        }
        claimed
    }
}

#[async_trait]
impl RequestQueue for InMemoryRequestQueue {
    async fn enqueue(&self, request: &SuggestionRequest) -> Result<String, QueueError> {
        let body =
            serde_json::to_string(request).map_err(|error| QueueError::Encode(error.to_string()))?;
        let message_id = Uuid::new_v4().to_string();

        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(StoredMessage {
            message_id: message_id.clone(),
            receipt_handle: Uuid::new_v4().to_string(),
            body,
            attributes: request.to_attributes(),
            visible_at: Instant::now(),
            receive_count: 0,
        });

        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let claimed = self.claim(max_messages, visibility_timeout);
            if !claimed.is_empty() || Instant::now() >= deadline {
                return Ok(claimed);
            }
            tokio::time::sleep(EMPTY_POLL_INTERVAL).await;
        }
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };

        let position = messages.iter().position(|stored| stored.receipt_handle == receipt.0);
        match position {
            Some(index) => {
                messages.remove(index);
                Ok(())
            }
            None => Err(QueueError::StaleReceipt(receipt.0.clone())),
        }
    }
}
