//! TTL reaper: periodically evicts jobs that finished long ago so the
//! registry doesn't grow without bound.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::JobManager;
use crate::job::JobState;

/// How often the reaper wakes up to sweep for expired jobs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Spawns the reaper as a detached background task. It never exits on its
/// own; `JobManager::stop` aborts the returned handle.
pub(super) fn spawn(manager: Arc<JobManager>, job_ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep(&manager, job_ttl);
        }
    })
}

fn sweep(manager: &Arc<JobManager>, job_ttl: Duration) {
    let mut registry = manager.registry.lock().unwrap();
    let now = Utc::now();
    let ttl = chrono::Duration::from_std(job_ttl).unwrap_or(chrono::Duration::zero());

    let before = registry.jobs.len();
    registry.jobs.retain(|_, job| {
        if !job.state.is_terminal() {
            return true;
        }
        match job.finished_at {
            Some(finished_at) => now - finished_at < ttl,
            None => true,
        }
    });
    let reaped = before - registry.jobs.len();
    if reaped > 0 {
        debug!(reaped, remaining = registry.jobs.len(), "TTL reaper swept terminal jobs");
    }
    debug_assert!(registry
        .jobs
        .values()
        .all(|j| j.state != JobState::Queued || registry.queued_order.contains(&j.id)));
}
