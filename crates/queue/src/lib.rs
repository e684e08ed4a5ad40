//! Queue collaborator contract and an in-memory implementation.
//!
//! The contract mirrors a managed at-least-once queue: enqueue a body, receive a
//! bounded batch with long-poll, delete by receipt handle. Infrastructure-backed
//! implementations live in `todorelay-infra`.

pub mod in_memory;
pub mod queue;
pub mod settings;

pub use in_memory::InMemoryQueue;
pub use queue::{MAX_RECEIVE_BATCH, MessageQueue, QueueError, ReceiveRequest, ReceivedMessage};
pub use settings::QueueSettings;
