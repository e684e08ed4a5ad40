//! Worker handler: materialise queued submissions into persisted todos.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use todorelay_core::{DomainError, TaskSubmission, Todo};
use todorelay_infra::{StoreError, TodoStore};
use todorelay_queue::ReceivedMessage;

/// Trigger envelope: `{"Records": [{"messageId", "receiptHandle", "body"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<String>,
    pub body: String,
}

impl QueueRecord {
    /// A hand-built record with only a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            receipt_handle: None,
            body: body.into(),
        }
    }
}

impl From<ReceivedMessage> for QueueRecord {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            message_id: Some(message.message_id),
            receipt_handle: Some(message.receipt_handle),
            body: message.body,
        }
    }
}

impl QueueBatch {
    pub fn from_messages(messages: impl IntoIterator<Item = ReceivedMessage>) -> Self {
        Self {
            records: messages.into_iter().map(QueueRecord::from).collect(),
        }
    }
}

/// Partial batch failure report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(rename = "batchItemFailures", default)]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

impl BatchResponse {
    pub fn is_complete_success(&self) -> bool {
        self.batch_item_failures.is_empty()
    }

    /// A failure without an identifier cannot be pinned to one message, so the
    /// whole batch counts as failed.
    pub fn fails_whole_batch(&self) -> bool {
        self.batch_item_failures
            .iter()
            .any(|f| f.item_identifier.is_empty())
    }

    pub fn failed_ids(&self) -> HashSet<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error(transparent)]
    Payload(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persist one new record per message in `batch`.
///
/// Records are handled independently: a message that fails to parse or to
/// persist is logged and reported in `batchItemFailures`, and the rest of the
/// batch still runs. Every success gets a freshly generated id, so
/// redelivering a message produces a second record.
#[instrument(skip_all, fields(records = batch.records.len()))]
pub async fn process_batch(store: &dyn TodoStore, batch: QueueBatch) -> BatchResponse {
    let mut response = BatchResponse::default();

    for QueueRecord {
        message_id, body, ..
    } in batch.records
    {
        let message_id = message_id.unwrap_or_default();
        match process_record(store, &body).await {
            Ok(todo) => {
                info!(todo_id = %todo.id, message_id = %message_id, "processed todo");
            }
            Err(err) => {
                error!(error = %err, message_id = %message_id, "failed to process todo message");
                response.batch_item_failures.push(BatchItemFailure {
                    item_identifier: message_id,
                });
            }
        }
    }

    response
}

async fn process_record(store: &dyn TodoStore, body: &str) -> Result<Todo, RecordError> {
    let submission = TaskSubmission::parse(Some(body))?;
    let todo = Todo::materialize(submission);
    store.put(&todo).await?;
    Ok(todo)
}
