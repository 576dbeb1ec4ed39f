//! At-least-once message queue port.
//!
//! A received message is hidden for its visibility timeout and comes back if
//! it is not deleted by receipt handle before the timeout ends.

use crate::errors::BackendError;
use crate::utils::generate_uuid;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Upper bound on messages returned by one receive.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// A message handed out by a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Stable message identifier.
    pub message_id: String,
    /// The message text.
    pub body: String,
    /// Handle for deleting this delivery.
    pub receipt_handle: String,
    /// How many times the message has been delivered, including this one.
    pub receive_count: u32,
}

/// Text messages with visibility-timeout delivery.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueues `body`. Returns the message id.
    async fn send(&self, body: &str) -> Result<String, BackendError>;

    /// Receives up to `max_messages` visible messages (clamped to
    /// 1..=[`MAX_RECEIVE_BATCH`]) and hides them for `visibility_timeout`.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BackendError>;

    /// Deletes the delivery identified by `receipt_handle`.
    async fn delete(&self, receipt_handle: &str) -> Result<(), BackendError>;
}

#[derive(Debug)]
struct QueuedMessage {
    message_id: String,
    body: String,
    receipt_handle: Option<String>,
    invisible_until: Option<Instant>,
    receive_count: u32,
}

impl QueuedMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

/// A [`MessageQueue`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    messages: Mutex<VecDeque<QueuedMessage>>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of messages not yet deleted, visible or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if every message has been deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, body: &str) -> Result<String, BackendError> {
        if body.is_empty() {
            return Err(BackendError::invalid_request(
                "send",
                "Cannot process empty message",
            ));
        }

        let message_id = generate_uuid().to_string();
        self.messages.lock().push_back(QueuedMessage {
            message_id: message_id.clone(),
            body: body.to_string(),
            receipt_handle: None,
            invisible_until: None,
            receive_count: 0,
        });
        debug!(message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BackendError> {
        let limit = max_messages.clamp(1, MAX_RECEIVE_BATCH);
        let now = Instant::now();
        let mut messages = self.messages.lock();

        let received = messages
            .iter_mut()
            .filter(|message| message.is_visible(now))
            .take(limit)
            .map(|message| {
                let receipt_handle = generate_uuid().to_string();
                message.receipt_handle = Some(receipt_handle.clone());
                message.invisible_until = Some(now + visibility_timeout);
                message.receive_count += 1;
                ReceivedMessage {
                    message_id: message.message_id.clone(),
                    body: message.body.clone(),
                    receipt_handle,
                    receive_count: message.receive_count,
                }
            })
            .collect();
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), BackendError> {
        let mut messages = self.messages.lock();
        let position = messages
            .iter()
            .position(|message| message.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| BackendError::invalid_request("delete", "receipt handle is invalid"))?;
        messages.remove(position);
        Ok(())
    }
}

/// Receives one batch and runs `handler` on each message, deleting those it
/// accepts. Rejected messages stay on the queue and reappear after the
/// visibility timeout.
///
/// Returns the ids of the deleted messages.
pub async fn process_batch<F>(
    queue: &dyn MessageQueue,
    visibility_timeout: Duration,
    mut handler: F,
) -> Result<Vec<String>, BackendError>
where
    F: FnMut(&ReceivedMessage) -> Result<(), String> + Send,
{
    let messages = queue.receive(MAX_RECEIVE_BATCH, visibility_timeout).await?;
    let mut processed = Vec::with_capacity(messages.len());

    for message in messages {
        match handler(&message) {
            Ok(()) => {
                queue.delete(&message.receipt_handle).await?;
                processed.push(message.message_id);
            }
            Err(reason) => {
                warn!(message_id = %message.message_id, reason = %reason, "Message processing failed");
            }
        }
    }

    Ok(processed)
}
