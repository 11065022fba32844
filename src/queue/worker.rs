//! Queue draining.
//!
//! Jobs run one at a time in FIFO order. A failing job is logged and
//! dropped; the worker moves on to the next one.

use tracing::{error, info, warn};

use super::{Job, TaskQueue};
use crate::error::{CubeCompError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkerStats {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Runs jobs until the queue is empty or `limit` jobs have been taken.
///
/// Backend failures (database, network) stop the worker; job failures and
/// unreadable payloads do not.
pub fn drain<F>(queue: &mut dyn TaskQueue, limit: Option<usize>, mut handler: F) -> Result<WorkerStats>
where
    F: FnMut(&Job) -> Result<()>,
{
    let mut stats = WorkerStats::default();
    info!("Worker draining queue {}", queue.name());

    while limit.is_none_or(|max| stats.processed() < max) {
        let job = match queue.dequeue() {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(CubeCompError::Queue(msg)) => {
                warn!("Dropping job: {}", msg);
                stats.failed += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        info!("Running job {}", job);
        match handler(&job) {
            Ok(()) => stats.succeeded += 1,
            Err(e) => {
                error!("Job {} failed: {}", job, e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "Worker done: {} succeeded, {} failed",
        stats.succeeded, stats.failed
    );
    Ok(stats)
}
