//! In-memory todo store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use todorelay_core::{Entity, Todo, TodoId};

use super::{StoreError, TodoStore};

#[derive(Debug, Default)]
pub struct InMemoryTodoStore {
    inner: RwLock<HashMap<TodoId, Todo>>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("todo store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn put(&self, todo: &Todo) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(todo.id()) {
            return Err(StoreError::Conflict(*todo.id()));
        }
        map.insert(*todo.id(), todo.clone());
        Ok(())
    }

    async fn get(&self, id: &TodoId) -> Result<Option<Todo>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut todos: Vec<_> = map.values().cloned().collect();
        // Ids are UUIDv7, so id order is creation order.
        todos.sort_by_key(|t| *t.id.as_uuid());
        Ok(todos)
    }
}

#[cfg(test)]
mod tests {
    use todorelay_core::TaskSubmission;

    use super::*;

    fn todo(task: &str) -> Todo {
        Todo::materialize(TaskSubmission::new(task).unwrap())
    }

    #[tokio::test]
    async fn put_get_list() {
        let store = InMemoryTodoStore::new();
        let a = todo("a");
        let b = todo("b");
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();

        assert_eq!(store.get(&a.id).await.unwrap(), Some(a.clone()));
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a) && listed.contains(&b));
    }

    #[tokio::test]
    async fn put_never_overwrites() {
        let store = InMemoryTodoStore::new();
        let a = todo("a");
        store.put(&a).await.unwrap();

        let mut changed = a.clone();
        changed.completed = true;
        let err = store.put(&changed).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(id) if id == a.id));
        assert_eq!(store.get(&a.id).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let store = InMemoryTodoStore::new();
        assert!(store.get(&TodoId::generate()).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }
}
