// In crates/engine/src/job.rs

use tokio::sync::{Mutex, MutexGuard};

/// Prevents two runs of the same periodic job from overlapping.
///
/// A tick that finds the previous run still holding the guard is skipped,
/// never queued.
#[derive(Debug)]
pub struct JobGuard {
    name: &'static str,
    lock: Mutex<()>,
}

impl JobGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the run permit, or `None` when a run is already in progress.
    pub fn try_start(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock.try_lock() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(job = self.name, "Previous run still in progress. Skipping this tick.");
                None
            }
        }
    }
}
