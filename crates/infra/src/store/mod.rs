//! Persisted todo storage.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use todorelay_core::{Todo, TodoId};

pub use in_memory::InMemoryTodoStore;
pub use postgres::PostgresTodoStore;

/// Store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A record with this id already exists; puts never overwrite.
    #[error("todo already exists: {0}")]
    Conflict(TodoId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Keyed record store for todos.
///
/// Every write targets a fresh id, so concurrent writers never race on the
/// same record. A put either writes the whole record or nothing.
#[async_trait::async_trait]
pub trait TodoStore: Send + Sync {
    /// Insert a new record keyed by its id.
    async fn put(&self, todo: &Todo) -> Result<(), StoreError>;

    async fn get(&self, id: &TodoId) -> Result<Option<Todo>, StoreError>;

    /// Every record, oldest first.
    async fn list(&self) -> Result<Vec<Todo>, StoreError>;
}

#[async_trait::async_trait]
impl<S> TodoStore for Arc<S>
where
    S: TodoStore + ?Sized,
{
    async fn put(&self, todo: &Todo) -> Result<(), StoreError> {
        (**self).put(todo).await
    }

    async fn get(&self, id: &TodoId) -> Result<Option<Todo>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        (**self).list().await
    }
}
