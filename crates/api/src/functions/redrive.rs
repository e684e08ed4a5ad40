//! Dead-letter redrive: move messages back from the DLQ to the primary queue.
//!
//! ## Ordering
//!
//! Messages are handled one at a time, in receipt order. A message is deleted
//! from the dead-letter queue only after the primary queue confirmed the
//! resubmission. Any failure stops the sweep; whatever was not yet deleted
//! stays in the dead-letter queue and becomes visible again after its
//! visibility timeout, so the next sweep picks it up. The worst case is a
//! duplicate on the primary queue, never a lost message.

use std::fmt;
use std::time::Duration;

use tracing::{error, info, instrument};

use todorelay_queue::{MessageQueue, QueueError, ReceiveRequest};

use super::envelope::ApiResponse;

/// Messages received per sweep.
pub const REDRIVE_MAX_MESSAGES: usize = 10;

/// Long-poll wait on the dead-letter queue per sweep.
pub const REDRIVE_WAIT: Duration = Duration::from_secs(5);

pub const REDRIVE_FAILED_MESSAGE: &str = "Error re-driving messages.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedriveSettings {
    pub max_messages: usize,
    pub wait: Duration,
}

impl Default for RedriveSettings {
    fn default() -> Self {
        Self {
            max_messages: REDRIVE_MAX_MESSAGES,
            wait: REDRIVE_WAIT,
        }
    }
}

impl RedriveSettings {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }
}

/// Outcome of a sweep that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedriveReport {
    /// The dead-letter queue had nothing visible.
    Empty,
    /// Number of messages resubmitted and deleted.
    Redriven(usize),
}

impl RedriveReport {
    pub fn redriven(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Redriven(n) => *n,
        }
    }
}

impl fmt::Display for RedriveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("No messages to re-drive."),
            Self::Redriven(n) => write!(f, "{n} messages re-driven."),
        }
    }
}

/// A sweep that stopped early.
#[derive(Debug, Clone, thiserror::Error)]
#[error("redrive aborted after {redriven} message(s): {source}")]
pub struct RedriveError {
    /// Messages fully redriven (resubmitted and deleted) before the failure.
    pub redriven: usize,
    pub source: QueueError,
}

/// One bounded sweep of `dead_letter` into `primary`.
#[instrument(
    skip_all,
    fields(dead_letter = dead_letter.name(), primary = primary.name()),
    err
)]
pub async fn redrive_dead_letters(
    dead_letter: &dyn MessageQueue,
    primary: &dyn MessageQueue,
    settings: RedriveSettings,
) -> Result<RedriveReport, RedriveError> {
    let messages = dead_letter
        .receive_batch(ReceiveRequest::new(settings.max_messages, settings.wait))
        .await
        .map_err(|source| RedriveError { redriven: 0, source })?;

    if messages.is_empty() {
        info!("no messages to re-drive");
        return Ok(RedriveReport::Empty);
    }

    let mut redriven = 0;
    for message in messages {
        primary
            .enqueue(message.body)
            .await
            .map_err(|source| RedriveError { redriven, source })?;
        dead_letter
            .delete_message(&message.receipt_handle)
            .await
            .map_err(|source| RedriveError { redriven, source })?;

        redriven += 1;
        info!(message_id = %message.message_id, "message re-driven to main queue");
    }

    Ok(RedriveReport::Redriven(redriven))
}

/// HTTP-style wrapper: 200 with the report text, or 500.
pub async fn redrive_handler(
    dead_letter: &dyn MessageQueue,
    primary: &dyn MessageQueue,
    settings: RedriveSettings,
) -> ApiResponse {
    match redrive_dead_letters(dead_letter, primary, settings).await {
        Ok(report) => ApiResponse::text(200, report.to_string()),
        Err(err) => {
            error!(error = %err, redriven = err.redriven, "error re-driving messages");
            ApiResponse::text(500, REDRIVE_FAILED_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use todorelay_queue::InMemoryQueue;

    use super::*;

    fn immediate() -> RedriveSettings {
        RedriveSettings::default().with_wait(Duration::ZERO)
    }

    #[test]
    fn report_text() {
        assert_eq!(RedriveReport::Empty.to_string(), "No messages to re-drive.");
        assert_eq!(RedriveReport::Redriven(3).to_string(), "3 messages re-driven.");
        assert_eq!(RedriveReport::Redriven(3).redriven(), 3);
    }

    #[test]
    fn defaults_match_sweep_bounds() {
        let settings = RedriveSettings::default();
        assert_eq!(settings.max_messages, 10);
        assert_eq!(settings.wait, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn moves_bodies_unmodified() {
        let dlq = Arc::new(InMemoryQueue::new("dlq"));
        let primary = InMemoryQueue::new("primary");
        dlq.enqueue(r#"{"task":"a"}"#.to_string()).await.unwrap();
        dlq.enqueue(r#"{"task":"b"}"#.to_string()).await.unwrap();

        let report = redrive_dead_letters(&dlq, &primary, immediate()).await.unwrap();
        assert_eq!(report, RedriveReport::Redriven(2));
        assert!(dlq.is_empty());
        assert_eq!(
            primary.bodies(),
            vec![r#"{"task":"a"}"#.to_string(), r#"{"task":"b"}"#.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_dead_letter_queue_waits_then_reports_empty() {
        let dlq = InMemoryQueue::new("dlq");
        let primary = InMemoryQueue::new("primary");

        let res = redrive_handler(&dlq, &primary, RedriveSettings::default()).await;
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, "No messages to re-drive.");
        assert!(primary.is_empty());
    }
}
