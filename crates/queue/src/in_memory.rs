//! In-memory queue for tests/dev.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::queue::{MAX_RECEIVE_BATCH, MessageQueue, QueueError, ReceiveRequest, ReceivedMessage};
use crate::settings::QueueSettings;

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    receipt_handle: Option<String>,
}

/// In-memory at-least-once queue.
///
/// - Visibility timeout and per-delivery receipt handles
/// - Optional dead-letter target, fed after `max_receive_count` receives
/// - Long-poll receive backed by a `Notify`
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    settings: QueueSettings,
    dead_letter: Option<Arc<InMemoryQueue>>,
    messages: Mutex<VecDeque<StoredMessage>>,
    arrivals: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: QueueSettings::default(),
            dead_letter: None,
            messages: Mutex::new(VecDeque::new()),
            arrivals: Notify::new(),
        }
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Route messages that exhausted `max_receive_count` to `target`.
    pub fn with_dead_letter(mut self, target: Arc<InMemoryQueue>) -> Self {
        self.dead_letter = Some(target);
        self
    }

    pub fn settings(&self) -> QueueSettings {
        self.settings
    }

    /// Number of messages held, visible or in flight.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every held body, in queue order.
    pub fn bodies(&self) -> Vec<String> {
        self.lock()
            .map(|m| m.iter().map(|s| s.body.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<StoredMessage>>, QueueError> {
        self.messages
            .lock()
            .map_err(|_| QueueError::Backend(format!("queue {} state lock poisoned", self.name)))
    }

    fn push(&self, message_id: String, body: String) -> Result<(), QueueError> {
        self.lock()?.push_back(StoredMessage {
            message_id,
            body,
            receive_count: 0,
            visible_at: Instant::now(),
            receipt_handle: None,
        });
        self.arrivals.notify_waiters();
        Ok(())
    }

    fn take_visible(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        let max = max.clamp(1, MAX_RECEIVE_BATCH);
        let now = Instant::now();
        let mut batch = Vec::new();
        let mut messages = self.lock()?;
        let mut i = 0;

        while i < messages.len() && batch.len() < max {
            let (visible, spent) = {
                let m = &messages[i];
                (
                    m.visible_at <= now,
                    m.receive_count >= self.settings.max_receive_count,
                )
            };

            if !visible {
                i += 1;
                continue;
            }

            if let (true, Some(target)) = (spent, &self.dead_letter) {
                // Copy first; the original is only dropped once the target holds it.
                let m = &messages[i];
                target.push(m.message_id.clone(), m.body.clone())?;
                warn!(
                    queue = %self.name,
                    dead_letter = %target.name,
                    message_id = %m.message_id,
                    receive_count = m.receive_count,
                    "message exceeded max receive count; moved to dead-letter queue"
                );
                messages.remove(i);
                continue;
            }

            let m = &mut messages[i];
            let handle = Uuid::now_v7().to_string();
            m.receive_count += 1;
            m.visible_at = now + self.settings.visibility_timeout;
            m.receipt_handle = Some(handle.clone());
            batch.push(ReceivedMessage {
                message_id: m.message_id.clone(),
                receipt_handle: handle,
                body: m.body.clone(),
                receive_count: m.receive_count,
            });
            i += 1;
        }

        Ok(batch)
    }

    fn next_visible_at(&self) -> Result<Option<Instant>, QueueError> {
        Ok(self.lock()?.iter().map(|m| m.visible_at).min())
    }
}

#[async_trait::async_trait]
impl MessageQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: String) -> Result<String, QueueError> {
        let message_id = Uuid::now_v7().to_string();
        self.push(message_id.clone(), body)?;
        debug!(queue = %self.name, message_id = %message_id, "message enqueued");
        Ok(message_id)
    }

    async fn receive_batch(
        &self,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + request.wait;

        loop {
            // Register for arrivals before looking, so an enqueue in between is not missed.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let batch = self.take_visible(request.max_messages)?;
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }

            let wake_at = match self.next_visible_at()? {
                Some(at) if at < deadline => at,
                _ => deadline,
            };

            tokio::select! {
                _ = &mut arrival => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut messages = self.lock()?;
        let pos = messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| QueueError::InvalidReceiptHandle(receipt_handle.to_string()))?;
        messages.remove(pos);
        Ok(())
    }
}
