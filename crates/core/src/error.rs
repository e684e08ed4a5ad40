//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are deterministic input failures. Queue and store failures are
/// modelled by the crates that own those collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The submission carried no `task`, a `null` task, or an empty one.
    #[error("Task is required")]
    MissingTask,

    /// The payload could not be read as a `{task}` document at all.
    #[error("Invalid request body: {0}")]
    MalformedPayload(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for failures caused by the caller's input (HTTP 400 class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingTask | Self::MalformedPayload(_))
    }
}
