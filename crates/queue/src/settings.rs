//! Delivery settings that a managed queue would otherwise apply implicitly.

use std::time::Duration;

/// Visibility and dead-lettering knobs for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// How long a received-but-not-deleted message stays hidden.
    pub visibility_timeout: Duration,
    /// Receives allowed before the message moves to the dead-letter target.
    pub max_receive_count: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 3,
        }
    }
}

impl QueueSettings {
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_max_receive_count(mut self, count: u32) -> Self {
        self.max_receive_count = count.max(1);
        self
    }
}
