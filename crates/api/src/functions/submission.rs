//! Submission handler: validate a `{task}` request and queue it.

use serde_json::json;
use tracing::{error, info, instrument, warn};

use todorelay_core::TaskSubmission;
use todorelay_queue::{MessageQueue, QueueError};

use super::envelope::{ApiRequest, ApiResponse};

pub const ACCEPTED_MESSAGE: &str = "Todo item accepted for processing.";

/// Accept a todo for asynchronous processing.
///
/// - invalid body or missing/empty `task` → 400, nothing is enqueued
/// - valid → exactly one enqueue of `{"task": ...}`, then 202
/// - enqueue failure → 500 with the failure message
///
/// Does not wait for the worker.
#[instrument(skip_all, fields(queue = queue.name()))]
pub async fn submit_todo(queue: &dyn MessageQueue, request: ApiRequest) -> ApiResponse {
    let submission = match TaskSubmission::parse(request.body.as_deref()) {
        Ok(submission) => submission,
        Err(err) => {
            warn!(error = %err, "rejected todo submission");
            return ApiResponse::error(400, err.to_string());
        }
    };

    match enqueue(queue, &submission).await {
        Ok(message_id) => {
            info!(message_id = %message_id, "todo submission queued");
            ApiResponse::json(202, &json!({ "message": ACCEPTED_MESSAGE }))
        }
        Err(err) => {
            error!(error = %err, "failed to enqueue todo submission");
            ApiResponse::error(500, err.to_string())
        }
    }
}

async fn enqueue(queue: &dyn MessageQueue, submission: &TaskSubmission) -> Result<String, QueueError> {
    let body = submission
        .to_message_body()
        .map_err(|e| QueueError::Serialization(e.to_string()))?;
    queue.enqueue(body).await
}

#[cfg(test)]
mod tests {
    use todorelay_queue::{InMemoryQueue, ReceiveRequest};

    use super::*;

    #[tokio::test]
    async fn valid_submission_is_queued_once() {
        let queue = InMemoryQueue::new("primary");
        let res = submit_todo(&queue, ApiRequest::with_body(r#"{"task":"buy milk"}"#)).await;

        assert_eq!(res.status_code, 202);
        assert_eq!(res.json_body(), Some(json!({ "message": ACCEPTED_MESSAGE })));
        assert_eq!(queue.bodies(), vec![r#"{"task":"buy milk"}"#.to_string()]);
    }

    #[tokio::test]
    async fn missing_task_is_rejected_without_enqueue() {
        let queue = InMemoryQueue::new("primary");
        for body in [None, Some("{}"), Some(r#"{"task":""}"#), Some(r#"{"task":null}"#)] {
            let res = submit_todo(&queue, ApiRequest { body: body.map(str::to_string) }).await;
            assert_eq!(res.status_code, 400, "body {body:?}");
            assert_eq!(res.json_body(), Some(json!({ "error": "Task is required" })));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let queue = InMemoryQueue::new("primary");
        for body in ["not json", "[1,2]", r#"{"task":42}"#, r#"{"task":"x","extra":true}"#] {
            let res = submit_todo(&queue, ApiRequest::with_body(body)).await;
            assert_eq!(res.status_code, 400, "body {body}");
            let error = res.json_body().unwrap()["error"].as_str().unwrap().to_string();
            assert!(error.starts_with("Invalid request body"), "{error}");
        }
        assert!(queue.receive_batch(ReceiveRequest::immediate(10)).await.unwrap().is_empty());
    }
}
