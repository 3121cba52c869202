//! Configuration for the asset manager.

use std::time::Duration;

use hoard_core::task_pool::DEFAULT_IDLE_SLEEP;

/// Settings for an [`AssetManager`](crate::AssetManager).
#[derive(Debug, Clone)]
pub struct AssetManagerConfig {
    /// Number of background workers running the off-thread loader phase.
    ///
    /// One is enough for correctness; more only help independent loads overlap.
    pub worker_threads: usize,
    /// How long an idle worker sleeps before checking for new work.
    pub worker_idle_sleep: Duration,
    /// Yield the driving thread between steps in the blocking helpers.
    pub yield_between_updates: bool,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            worker_idle_sleep: DEFAULT_IDLE_SLEEP,
            yield_between_updates: true,
        }
    }
}

impl AssetManagerConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of background workers (at least one is always used).
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the idle sleep of background workers.
    pub fn worker_idle_sleep(mut self, sleep: Duration) -> Self {
        self.worker_idle_sleep = sleep;
        self
    }

    /// Set whether blocking helpers yield between steps.
    pub fn yield_between_updates(mut self, yield_now: bool) -> Self {
        self.yield_between_updates = yield_now;
        self
    }
}
