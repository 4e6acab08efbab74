//! Per-file stability wait applied before a path may be queued.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::debug;

/// Fixed settle delay; notifications can fire before the writer is done.
#[derive(Debug, Clone, Copy)]
pub struct StabilityWait {
    delay: Duration,
}

impl StabilityWait {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the configured delay, then report whether `path` is still a
    /// regular file. Vanished or non-file paths yield `false`.
    pub fn settle(&self, path: &Path) -> bool {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let present = path.is_file();
        if !present {
            debug!(file = %path.display(), "gone after stability wait");
        }
        present
    }
}
