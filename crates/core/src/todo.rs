//! The todo record and the submission payload that precedes it.
//!
//! A submission is the `{task}` document that travels through the queue. It
//! only becomes a [`Todo`] (with an id) when a worker materialises it.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::TodoId;

/// Validated `{task}` payload.
///
/// Used both for inbound client requests and for queue message bodies, so the
/// same schema is enforced at every boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSubmission {
    task: String,
}

/// Wire shape before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubmission {
    #[serde(default)]
    task: Option<String>,
}

impl TaskSubmission {
    /// Build a submission from an already-extracted task text.
    pub fn new(task: impl Into<String>) -> DomainResult<Self> {
        let task = task.into();
        if task.is_empty() {
            return Err(DomainError::MissingTask);
        }
        Ok(Self { task })
    }

    /// Schema-on-read parse of a JSON document.
    ///
    /// A missing or blank body is read as `{}`, which then fails with
    /// [`DomainError::MissingTask`]. Anything that is not an object with at most
    /// a string `task` field is [`DomainError::MalformedPayload`].
    pub fn parse(body: Option<&str>) -> DomainResult<Self> {
        let body = match body {
            Some(b) if !b.trim().is_empty() => b,
            _ => "{}",
        };

        let raw: RawSubmission =
            serde_json::from_str(body).map_err(|e| DomainError::malformed(e.to_string()))?;

        match raw.task {
            Some(task) => Self::new(task),
            None => Err(DomainError::MissingTask),
        }
    }

    /// Serialize as the queue message body (`{"task": ...}`).
    pub fn to_message_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn into_task(self) -> String {
        self.task
    }
}

/// Persisted todo record: `{id, task, completed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub task: String,
    pub completed: bool,
}

impl Todo {
    /// Materialise a submission into a new record with a fresh id.
    pub fn materialize(submission: TaskSubmission) -> Self {
        Self {
            id: TodoId::generate(),
            task: submission.into_task(),
            completed: false,
        }
    }
}

impl Entity for Todo {
    type Id = TodoId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
