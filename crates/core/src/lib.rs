//! `todorelay-core`: domain building blocks for the todo relay.
//!
//! This crate contains **pure domain** primitives (no queue, store or HTTP concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod todo;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::TodoId;
pub use todo::{TaskSubmission, Todo};
