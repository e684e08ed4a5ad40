//! Message queue abstraction (mechanics only).
//!
//! This is the boundary between the function handlers and whatever queue
//! service carries their messages.
//!
//! ## Delivery Guarantees
//!
//! - **At-least-once**: a message may be received more than once; it is only
//!   gone after `delete_message` succeeds with a current receipt handle.
//! - **No ordering guarantees** across receives.
//! - **Visibility timeout**: a received message is hidden from other receivers
//!   until it is deleted or the timeout expires, then becomes visible again.
//!
//! ## Receipt Handles
//!
//! Every delivery attempt gets its own receipt handle. Only the handle from the
//! latest delivery is valid for deletion.

use std::sync::Arc;
use std::time::Duration;

/// Hard upper bound on a single receive call.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Parameters for one receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// Maximum messages to return (clamped to `1..=MAX_RECEIVE_BATCH`).
    pub max_messages: usize,
    /// Long-poll: how long to wait for a message if none is visible.
    pub wait: Duration,
}

impl ReceiveRequest {
    pub fn new(max_messages: usize, wait: Duration) -> Self {
        Self {
            max_messages: max_messages.clamp(1, MAX_RECEIVE_BATCH),
            wait,
        }
    }

    /// Return immediately with whatever is visible.
    pub fn immediate(max_messages: usize) -> Self {
        Self::new(max_messages, Duration::ZERO)
    }
}

/// A message as handed to a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Stable id of the message across deliveries.
    pub message_id: String,
    /// Token for this delivery attempt; required to delete the message.
    pub receipt_handle: String,
    /// Opaque body, as enqueued.
    pub body: String,
    /// How many times the message has been received, including this one.
    pub receive_count: u32,
}

/// Queue operation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("invalid receipt handle: {0}")]
    InvalidReceiptHandle(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("queue backend error: {0}")]
    Backend(String),
}

/// An at-least-once message queue.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); one
/// process-wide handle is created at startup and reused by every invocation.
#[async_trait::async_trait]
pub trait MessageQueue: Send + Sync {
    /// Human-readable queue name (used in logs).
    fn name(&self) -> &str;

    /// Append a message; returns its message id once the queue confirmed it.
    async fn enqueue(&self, body: String) -> Result<String, QueueError>;

    /// Receive up to `request.max_messages` visible messages.
    ///
    /// Returns an empty batch (not an error) when nothing arrives within
    /// `request.wait`.
    async fn receive_batch(&self, request: ReceiveRequest)
    -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a received message using the receipt handle of its latest delivery.
    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

#[async_trait::async_trait]
impl<Q> MessageQueue for Arc<Q>
where
    Q: MessageQueue + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn enqueue(&self, body: String) -> Result<String, QueueError> {
        (**self).enqueue(body).await
    }

    async fn receive_batch(
        &self,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        (**self).receive_batch(request).await
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).delete_message(receipt_handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_request_is_clamped() {
        assert_eq!(ReceiveRequest::immediate(0).max_messages, 1);
        assert_eq!(ReceiveRequest::immediate(50).max_messages, MAX_RECEIVE_BATCH);
        assert_eq!(ReceiveRequest::new(4, Duration::from_secs(5)).max_messages, 4);
    }
}
