use std::sync::Arc;

use axum::extract::Extension;

use crate::app::services::AppServices;
use crate::functions::{self, ApiRequest, ApiResponse};

/// `POST /todos`: queue a submission (202).
pub async fn submit(Extension(services): Extension<Arc<AppServices>>, body: String) -> ApiResponse {
    functions::submit_todo(services.primary.as_ref(), ApiRequest::with_body(body)).await
}

/// `POST /todos/direct`: write straight to the store (201).
pub async fn create_direct(
    Extension(services): Extension<Arc<AppServices>>,
    body: String,
) -> ApiResponse {
    functions::create_todo_direct(services.store.as_ref(), ApiRequest::with_body(body)).await
}

/// `GET /todos`
pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> ApiResponse {
    functions::list_todos(services.store.as_ref()).await
}
