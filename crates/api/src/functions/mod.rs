//! Function handlers.
//!
//! Each handler is a stateless unit: it takes the process-wide collaborator
//! handles plus one invocation payload and returns one result. The HTTP
//! surface (`crate::app`) and the background runtime (`crate::runtime`) are
//! thin adapters over these functions.

pub mod envelope;
pub mod redrive;
pub mod submission;
pub mod todos;
pub mod worker;

pub use envelope::{ApiRequest, ApiResponse};
pub use redrive::{
    REDRIVE_MAX_MESSAGES, REDRIVE_WAIT, RedriveError, RedriveReport, RedriveSettings,
    redrive_dead_letters, redrive_handler,
};
pub use submission::submit_todo;
pub use todos::{create_todo_direct, list_todos};
pub use worker::{BatchItemFailure, BatchResponse, QueueBatch, QueueRecord, process_batch};
