//! Queue trigger: poll the primary queue and feed batches to the worker.
//!
//! After each batch every message the worker did not report as failed is
//! deleted. Failed messages are left alone; they reappear after the
//! visibility timeout and, once they exhaust the queue's max receive count,
//! move to the dead-letter queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use todorelay_infra::{RelayConfig, TodoStore};
use todorelay_queue::{MAX_RECEIVE_BATCH, MessageQueue, QueueError, ReceiveRequest, ReceivedMessage};

use super::RuntimeHandle;
use crate::functions::{QueueBatch, process_batch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub batch_size: usize,
    /// Long-poll wait per receive.
    pub wait: Duration,
    /// Pause after a failed receive.
    pub error_backoff: Duration,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_RECEIVE_BATCH,
            wait: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl TriggerSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            batch_size: config.worker_batch_size,
            wait: config.worker_wait,
            ..Self::default()
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub received: usize,
    pub failed: usize,
    pub deleted: usize,
}

pub struct QueueTrigger {
    queue: Arc<dyn MessageQueue>,
    store: Arc<dyn TodoStore>,
    settings: TriggerSettings,
}

impl QueueTrigger {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        store: Arc<dyn TodoStore>,
        settings: TriggerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            settings,
        }
    }

    /// Receive one batch and process it.
    pub async fn poll_once(&self) -> Result<PollOutcome, QueueError> {
        let messages = self.receive().await?;
        Ok(self.handle(messages).await)
    }

    async fn receive(&self) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.queue
            .receive_batch(ReceiveRequest::new(self.settings.batch_size, self.settings.wait))
            .await
    }

    async fn handle(&self, messages: Vec<ReceivedMessage>) -> PollOutcome {
        if messages.is_empty() {
            return PollOutcome::default();
        }

        let received = messages.len();
        let receipts: Vec<(String, String)> = messages
            .iter()
            .map(|m| (m.message_id.clone(), m.receipt_handle.clone()))
            .collect();

        let response = process_batch(self.store.as_ref(), QueueBatch::from_messages(messages)).await;
        if response.fails_whole_batch() {
            warn!(queue = self.queue.name(), received, "batch failed as a whole; nothing deleted");
            return PollOutcome {
                received,
                failed: received,
                deleted: 0,
            };
        }

        let failed = response.failed_ids();
        let mut deleted = 0;
        for (message_id, receipt_handle) in &receipts {
            if failed.contains(message_id.as_str()) {
                continue;
            }
            match self.queue.delete_message(receipt_handle).await {
                Ok(()) => deleted += 1,
                // The message reappears after its visibility timeout and is processed again.
                Err(err) => warn!(
                    queue = self.queue.name(),
                    message_id = %message_id,
                    error = %err,
                    "failed to delete processed message"
                ),
            }
        }

        PollOutcome {
            received,
            failed: failed.len(),
            deleted,
        }
    }

    /// Run until the returned handle is shut down.
    ///
    /// Shutdown interrupts a pending receive, never a batch in progress.
    pub fn spawn(self) -> RuntimeHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            info!(queue = self.queue.name(), "queue trigger started");
            loop {
                let received = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = self.receive() => received,
                };

                match received {
                    Ok(messages) => {
                        let outcome = self.handle(messages).await;
                        if outcome.received > 0 {
                            debug!(
                                queue = self.queue.name(),
                                received = outcome.received,
                                failed = outcome.failed,
                                deleted = outcome.deleted,
                                "batch handled"
                            );
                        }
                    }
                    Err(err) => {
                        error!(queue = self.queue.name(), error = %err, "queue receive failed");
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            _ = tokio::time::sleep(self.settings.error_backoff) => {}
                        }
                    }
                }
            }
            info!(queue = self.queue.name(), "queue trigger stopped");
        });

        RuntimeHandle::new("queue-trigger", shutdown_tx, join)
    }
}

#[cfg(test)]
mod tests {
    use todorelay_infra::InMemoryTodoStore;
    use todorelay_queue::{InMemoryQueue, QueueSettings};

    use super::*;

    fn settings() -> TriggerSettings {
        TriggerSettings {
            wait: Duration::ZERO,
            ..TriggerSettings::default()
        }
    }

    #[tokio::test]
    async fn processed_messages_are_deleted() {
        let queue = Arc::new(InMemoryQueue::new("primary"));
        let store = Arc::new(InMemoryTodoStore::new());
        queue.enqueue(r#"{"task":"a"}"#.to_string()).await.unwrap();
        queue.enqueue(r#"{"task":"b"}"#.to_string()).await.unwrap();

        let trigger = QueueTrigger::new(queue.clone(), store.clone(), settings());
        let outcome = trigger.poll_once().await.unwrap();

        assert_eq!(outcome, PollOutcome { received: 2, failed: 0, deleted: 2 });
        assert!(queue.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_messages_stay_and_eventually_dead_letter() {
        let dlq = Arc::new(InMemoryQueue::new("dlq"));
        let queue = Arc::new(
            InMemoryQueue::new("primary")
                .with_settings(
                    QueueSettings::default()
                        .with_visibility_timeout(Duration::from_secs(1))
                        .with_max_receive_count(2),
                )
                .with_dead_letter(dlq.clone()),
        );
        let store = Arc::new(InMemoryTodoStore::new());
        queue.enqueue("not json".to_string()).await.unwrap();
        queue.enqueue(r#"{"task":"ok"}"#.to_string()).await.unwrap();

        let trigger = QueueTrigger::new(queue.clone(), store.clone(), settings());
        let first = trigger.poll_once().await.unwrap();
        assert_eq!(first, PollOutcome { received: 2, failed: 1, deleted: 1 });
        assert_eq!(queue.bodies(), vec!["not json".to_string()]);

        tokio::time::advance(Duration::from_secs(2)).await;
        let second = trigger.poll_once().await.unwrap();
        assert_eq!(second.failed, 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = trigger.poll_once().await.unwrap();
        assert_eq!(third, PollOutcome::default());
        assert!(queue.is_empty());
        assert_eq!(dlq.bodies(), vec!["not json".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn spawned_trigger_drains_queue_and_stops() {
        let queue = Arc::new(InMemoryQueue::new("primary"));
        let store = Arc::new(InMemoryTodoStore::new());
        queue.enqueue(r#"{"task":"a"}"#.to_string()).await.unwrap();

        let handle = QueueTrigger::new(
            queue.clone(),
            store.clone(),
            TriggerSettings {
                wait: Duration::from_millis(20),
                ..TriggerSettings::default()
            },
        )
        .spawn();

        for _ in 0..100 {
            if store.len() == 1 && queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(store.len(), 1);
        assert!(queue.is_empty());
    }
}
