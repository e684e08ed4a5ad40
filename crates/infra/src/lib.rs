//! Infrastructure layer: store adapters, queue backends, configuration.

pub mod config;
pub mod queue;
pub mod store;

pub use config::{Backend, ConfigError, RelayConfig};
pub use store::{InMemoryTodoStore, PostgresTodoStore, StoreError, TodoStore};
