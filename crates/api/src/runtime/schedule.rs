//! Periodic dead-letter redrive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use todorelay_queue::MessageQueue;

use super::RuntimeHandle;
use crate::functions::{RedriveSettings, redrive_dead_letters};

/// Runs one redrive sweep every `interval` (at least one second), first one
/// after a full interval.
pub struct RedriveSchedule {
    dead_letter: Arc<dyn MessageQueue>,
    primary: Arc<dyn MessageQueue>,
    interval: Duration,
    settings: RedriveSettings,
}

impl RedriveSchedule {
    pub fn new(
        dead_letter: Arc<dyn MessageQueue>,
        primary: Arc<dyn MessageQueue>,
        interval: Duration,
    ) -> Self {
        Self {
            dead_letter,
            primary,
            interval: interval.max(Duration::from_secs(1)),
            settings: RedriveSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RedriveSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn spawn(self) -> RuntimeHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticks = tokio::time::interval_at(start, self.interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                dead_letter = self.dead_letter.name(),
                interval_secs = self.interval.as_secs(),
                "redrive schedule started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticks.tick() => {}
                }

                // Stopping mid-sweep is safe: unconfirmed messages stay in the DLQ.
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = redrive_dead_letters(
                        self.dead_letter.as_ref(),
                        self.primary.as_ref(),
                        self.settings,
                    ) => {
                        if let Err(err) = result {
                            error!(error = %err, redriven = err.redriven, "scheduled redrive failed");
                        }
                    }
                }
            }
            info!(dead_letter = self.dead_letter.name(), "redrive schedule stopped");
        });

        RuntimeHandle::new("redrive-schedule", shutdown_tx, join)
    }
}
