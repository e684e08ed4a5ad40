//! Background tasks that invoke the function handlers.
//!
//! These stand in for what a managed platform does around the handlers: the
//! queue trigger feeds the worker, the schedule fires the redrive sweep.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

pub mod schedule;
pub mod trigger;

pub use schedule::RedriveSchedule;
pub use trigger::{PollOutcome, QueueTrigger, TriggerSettings};

/// Handle to control and join a background task.
#[derive(Debug)]
pub struct RuntimeHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RuntimeHandle {
    fn new(name: &'static str, shutdown: watch::Sender<bool>, join: JoinHandle<()>) -> Self {
        Self {
            name,
            shutdown,
            join,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            warn!(task = self.name, error = %err, "background task ended abnormally");
        }
    }
}
