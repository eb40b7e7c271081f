//! Worker pool.
//!
//! Each worker idles on the wakeup channel with a bounded (1s) timeout —
//! the only polling in the system, so a worker notices `shutdown` promptly
//! even if no further wake signal ever arrives. On a real wake it dequeues
//! exactly one job from the authoritative `VecDeque` under the lock,
//! re-validates its state (it may have been cancelled before dispatch),
//! runs it outside the lock, then loops back to waiting.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::{JobManager, WorkerSignal};
use crate::job::{JobId, JobState, Mode};

/// Bounded wait on the wakeup channel; workers re-check the shutdown flag
/// this often even with no new jobs arriving.
const WAKEUP_POLL: Duration = Duration::from_secs(1);

pub(super) fn spawn_pool(
    manager: Arc<JobManager>,
    rx: mpsc::Receiver<WorkerSignal>,
    max_workers: usize,
) -> Vec<JoinHandle<()>> {
    if max_workers == 0 {
        // Deliberately start no workers; jobs accumulate in Queued state.
        // The receiver is dropped here, which is fine: submit() ignores
        // send failures on a closed channel.
        return Vec::new();
    }

    // A single shared receiver, wrapped so every worker task can pull from
    // it; tokio's mpsc Receiver isn't Clone, so we fan it out through a
    // shared lock rather than one dispatcher loop per worker.
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    (0..max_workers)
        .map(|worker_id| {
            let manager = manager.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                run_worker(worker_id, manager, rx).await;
            })
        })
        .collect()
}

async fn run_worker(
    worker_id: usize,
    manager: Arc<JobManager>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkerSignal>>>,
) {
    info!(worker_id, "worker started");
    loop {
        if manager.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let received = {
            let mut rx = rx.lock().await;
            timeout(WAKEUP_POLL, rx.recv()).await
        };

        match received {
            Err(_elapsed) => continue,
            Ok(None) | Ok(Some(WorkerSignal::Shutdown)) => break,
            Ok(Some(WorkerSignal::Wake)) => {}
        }

        if let Some((id, task_id, code, mode)) = dequeue_one(&manager) {
            info!(worker_id, job_id = %id, %task_id, "job started");
            process_job(&manager, id, &task_id, &code, mode).await;
        }
    }
    info!(worker_id, "worker stopped");
}

/// Pops the head of the authoritative queue and transitions it to
/// `Running`, or returns `None` if the queue is empty or the head was
/// cancelled out from under us before dispatch.
fn dequeue_one(manager: &Arc<JobManager>) -> Option<(JobId, String, String, Mode)> {
    let mut registry = manager.registry.lock().unwrap();
    let id = registry.queued_order.pop_front()?;
    let job = registry.jobs.get_mut(&id)?;
    if job.state != JobState::Queued {
        return None;
    }
    job.mark_started();
    Some((id, job.request.task_id.clone(), job.request.code.clone(), job.request.mode))
}

async fn process_job(manager: &Arc<JobManager>, id: JobId, task_id: &str, code: &str, mode: Mode) {
    let outcome = match manager.tasks.get(task_id).await {
        Ok(task) => manager.runner.judge(&task, code, mode).await,
        Err(e) => Err(e),
    };

    let mut registry = manager.registry.lock().unwrap();
    let duration_ms = if let Some(job) = registry.jobs.get_mut(&id) {
        debug_assert_eq!(job.state, JobState::Running);
        match outcome {
            Ok(result) => {
                info!(job_id = %id, verdict = %result.verdict, "job finished");
                job.mark_done(result);
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "job failed");
                job.mark_error(e.to_string());
            }
        }
        job.duration_ms()
    } else {
        warn!(job_id = %id, "job vanished from registry before completion could be recorded");
        None
    };
    if let Some(ms) = duration_ms {
        registry.record_duration(ms);
    }
}
