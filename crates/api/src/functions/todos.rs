//! Synchronous store access: direct create and list.

use tracing::{error, info, instrument, warn};

use todorelay_core::{TaskSubmission, Todo};
use todorelay_infra::TodoStore;

use super::envelope::{ApiRequest, ApiResponse};

pub const LIST_FAILED_MESSAGE: &str = "Internal Server Error";

/// Validate, assign an id and write the record straight to the store (201).
#[instrument(skip_all)]
pub async fn create_todo_direct(store: &dyn TodoStore, request: ApiRequest) -> ApiResponse {
    let submission = match TaskSubmission::parse(request.body.as_deref()) {
        Ok(submission) => submission,
        Err(err) => {
            warn!(error = %err, "rejected todo");
            return ApiResponse::error(400, err.to_string());
        }
    };

    let todo = Todo::materialize(submission);
    match store.put(&todo).await {
        Ok(()) => {
            info!(todo_id = %todo.id, "created todo");
            ApiResponse::json(201, &todo)
        }
        Err(err) => {
            error!(error = %err, "failed to store todo");
            ApiResponse::error(500, err.to_string())
        }
    }
}

/// Every stored record as a JSON array. Store failures are logged, not returned.
#[instrument(skip_all)]
pub async fn list_todos(store: &dyn TodoStore) -> ApiResponse {
    match store.list().await {
        Ok(todos) => ApiResponse::json(200, &todos),
        Err(err) => {
            error!(error = %err, "error fetching todos");
            ApiResponse::error(500, LIST_FAILED_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use todorelay_infra::InMemoryTodoStore;

    use super::*;

    #[tokio::test]
    async fn direct_create_returns_the_record() {
        let store = InMemoryTodoStore::new();
        let res = create_todo_direct(&store, ApiRequest::with_body(r#"{"task":"walk dog"}"#)).await;
        assert_eq!(res.status_code, 201);

        let created: Todo = serde_json::from_str(&res.body).unwrap();
        assert_eq!(created.task, "walk dog");
        assert!(!created.completed);
        let stored = store.get(&created.id).await.unwrap();
        assert_eq!(stored, Some(created));
    }

    #[tokio::test]
    async fn direct_create_validates_like_submission() {
        let store = InMemoryTodoStore::new();
        let res = create_todo_direct(&store, ApiRequest::with_body(r#"{"task":""}"#)).await;
        assert_eq!(res.status_code, 400);
        assert_eq!(res.json_body(), Some(json!({ "error": "Task is required" })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_returns_every_record() {
        let store = InMemoryTodoStore::new();
        let empty = list_todos(&store).await;
        assert_eq!(empty.status_code, 200);
        assert_eq!(empty.json_body(), Some(json!([])));

        for task in ["a", "b"] {
            create_todo_direct(&store, ApiRequest::with_body(json!({ "task": task }).to_string())).await;
        }
        let res = list_todos(&store).await;
        let todos: Vec<Todo> = serde_json::from_str(&res.body).unwrap();
        assert_eq!(todos.len(), 2);
    }
}
