//! The Job Manager: bounded admission queue, worker pool dispatch, status
//! and ETA computation.
//!
//! A single `std::sync::Mutex` guards the registry (`jobs`, `queued_order`,
//! `recent_durations`). Critical sections touching it must be O(1) and must
//! never hold the lock across an `.await` point; everything that talks to
//! the sandbox or the filesystem happens after the lock is dropped.

mod reaper;
mod worker;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::job::{Job, JobId, JobRequest, JobState, JobStatus, Mode};
use crate::runner::Runner;
use crate::tasks::TaskRepository;

/// Rolling window size for the recent-duration average used by ETA.
const DURATION_WINDOW: usize = 20;
/// Average job duration assumed before any job has completed.
const DEFAULT_AVG_DURATION_MS: u64 = 3000;

struct Registry {
    jobs: HashMap<JobId, Job>,
    queued_order: VecDeque<JobId>,
    recent_durations: VecDeque<u64>,
}

impl Registry {
    fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            queued_order: VecDeque::new(),
            recent_durations: VecDeque::new(),
        }
    }

    fn record_duration(&mut self, ms: u64) {
        self.recent_durations.push_back(ms);
        if self.recent_durations.len() > DURATION_WINDOW {
            self.recent_durations.pop_front();
        }
    }

    fn avg_duration_ms(&self) -> u64 {
        if self.recent_durations.is_empty() {
            return DEFAULT_AVG_DURATION_MS;
        }
        let sum: u64 = self.recent_durations.iter().sum();
        sum / self.recent_durations.len() as u64
    }

    fn queue_position(&self, id: &JobId) -> Option<usize> {
        self.queued_order.iter().position(|j| j == id)
    }
}

/// Wakes an idle worker to check the queue, or tells it to shut down.
#[derive(Debug, Clone, Copy)]
enum WorkerSignal {
    Wake,
    Shutdown,
}

/// Owns the job registry and worker pool. Cheap to clone (internally
/// `Arc`-backed); the canonical handle is wrapped in an `Arc` by callers.
pub struct JobManager {
    registry: Arc<Mutex<Registry>>,
    tx: mpsc::Sender<WorkerSignal>,
    runner: Arc<Runner>,
    tasks: Arc<dyn TaskRepository>,
    max_workers: usize,
    max_queue: usize,
    code_max_bytes: usize,
    shutdown: AtomicBool,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobManager {
    /// Builds the manager and starts its worker pool and TTL reaper.
    ///
    /// `max_workers == 0` is accepted (used by tests that want jobs to sit
    /// in `Queued` forever); `Config::validate` forbids it for the
    /// HTTP-facing configuration surface, but the manager itself imposes no
    /// such restriction.
    pub fn start(
        max_workers: usize,
        max_queue: usize,
        code_max_bytes: usize,
        job_ttl: Duration,
        runner: Runner,
        tasks: Arc<dyn TaskRepository>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(max_queue.max(1) + 1);
        let manager = Arc::new(Self {
            registry: Arc::new(Mutex::new(Registry::new())),
            tx,
            runner: Arc::new(runner),
            tasks,
            max_workers,
            max_queue,
            code_max_bytes,
            shutdown: AtomicBool::new(false),
            worker_handles: Mutex::new(Vec::new()),
            reaper_handle: Mutex::new(None),
        });

        let handles = worker::spawn_pool(manager.clone(), rx, max_workers);
        *manager.worker_handles.lock().unwrap() = handles;
        *manager.reaper_handle.lock().unwrap() = Some(reaper::spawn(manager.clone(), job_ttl));

        manager
    }

    /// Cooperative shutdown: stops accepting further dispatch, signals every
    /// worker to exit after its current job, and awaits them. In-flight
    /// jobs run to completion; queued-but-undispatched jobs are left exactly
    /// where they are (`Queued`, or `Error` if a worker got to them first) —
    /// they are not auto-cancelled. Idempotent; safe to call more than once.
    pub async fn stop(&self) {
        info!(workers = self.max_workers, "stopping job manager");
        self.shutdown.store(true, Ordering::SeqCst);

        for _ in 0..self.max_workers {
            let _ = self.tx.send(WorkerSignal::Shutdown).await;
        }

        let handles: Vec<_> = self.worker_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(handle) = self.reaper_handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Validates and admits a new job, returning its id.
    ///
    /// Rejects oversized code, unknown modes, an unknown `task_id`, and (via
    /// `max_queue`) a full admission queue. The task lookup happens
    /// synchronously here, before a queue slot is taken, so a bad `task_id`
    /// fails fast with `TaskNotFound` rather than occupying admission
    /// capacity — this is also what lets the CLI's own `submit` path (which
    /// has no separate HTTP-layer pre-validation) reject unknown tasks.
    /// `worker.rs` re-fetches the task by id once the job is dispatched,
    /// since the registry only stores the request (`task_id`/`code`/`mode`),
    /// not the loaded `Task`; this is a deliberate double fetch rather than
    /// an oversight.
    pub async fn submit(&self, task_id: String, code: String, mode: &str) -> Result<JobId> {
        // Validation order mirrors the external submit contract: task_id,
        // then mode, then code size, before a queue slot is ever touched.
        self.tasks.get(&task_id).await?;

        let mode = Mode::parse(mode).ok_or_else(|| Error::InvalidMode(mode.to_string()))?;

        if code.len() > self.code_max_bytes {
            return Err(Error::CodeTooLarge {
                len: code.len(),
                max: self.code_max_bytes,
            });
        }

        let id = Uuid::new_v4();
        let request = JobRequest {
            task_id,
            code,
            mode,
        };

        {
            let mut registry = self.registry.lock().unwrap();
            if registry.queued_order.len() >= self.max_queue {
                warn!(max_queue = self.max_queue, "admission rejected: queue full");
                return Err(Error::QueueFull);
            }
            registry.jobs.insert(id, Job::new(id, request));
            registry.queued_order.push_back(id);
        }

        info!(job_id = %id, "job admitted");

        // Best-effort: if the channel is momentarily full a worker is
        // already awake and will drain the queue regardless.
        let _ = self.tx.try_send(WorkerSignal::Wake);

        Ok(id)
    }

    /// Returns the observable projection of a job, or `None` if unknown.
    pub fn get_job(&self, id: &JobId) -> Option<JobStatus> {
        let registry = self.registry.lock().unwrap();
        let job = registry.jobs.get(id)?;

        let (queue_position, eta_ms, running_for_ms) = match job.state {
            JobState::Queued => {
                let position = registry.queue_position(id).unwrap_or(0);
                let avg = registry.avg_duration_ms();
                let workers = self.max_workers.max(1) as u64;
                let eta = (((position as u64) + 1) * avg).div_ceil(workers);
                (Some(position), Some(eta), None)
            }
            JobState::Running => {
                let running_for = job
                    .started_at
                    .map(|t| (chrono::Utc::now() - t).num_milliseconds().max(0) as u64);
                (None, None, running_for)
            }
            JobState::Done | JobState::Error => (None, None, None),
        };

        Some(JobStatus {
            job_id: job.id,
            state: job.state,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            queue_position,
            eta_ms,
            running_for_ms,
            result: job.result.clone(),
            error_message: job.error_message.clone(),
        })
    }

    /// Cancels a job that is still `Queued`. Running jobs cannot be
    /// cancelled; terminal jobs are no-ops that report `TaskNotFound`-style
    /// absence via the `false` return.
    pub fn cancel(&self, id: &JobId) -> Result<bool> {
        let mut registry = self.registry.lock().unwrap();
        let still_queued = matches!(registry.jobs.get(id).map(|j| j.state), Some(JobState::Queued));
        if !still_queued {
            return Ok(false);
        }
        registry.queued_order.retain(|j| j != id);
        if let Some(job) = registry.jobs.get_mut(id) {
            job.mark_error("Cancelled by user");
        }
        info!(job_id = %id, "job cancelled before dispatch");
        Ok(true)
    }

    /// A snapshot of pool occupancy, for the health endpoint.
    pub fn stats(&self) -> ManagerStats {
        let registry = self.registry.lock().unwrap();
        ManagerStats {
            workers: self.max_workers,
            queue_size: registry.queued_order.len(),
            jobs_count: registry.jobs.len(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerStats {
    pub workers: usize,
    pub queue_size: usize,
    pub jobs_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxExecutor, SandboxOutput};
    use crate::tasks::{Task, TaskMeta};
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeSandbox;

    #[async_trait]
    impl SandboxExecutor for FakeSandbox {
        async fn run(
            &self,
            command: &[String],
            _work_dir: &Path,
            _stdin: &[u8],
            _timeout_ms: u64,
        ) -> Result<SandboxOutput> {
            if command.first().map(String::as_str) == Some("zig") {
                return Ok(SandboxOutput {
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    exit_code: 0,
                    duration_ms: 1,
                });
            }
            Ok(SandboxOutput {
                stdout: b"ok\n".to_vec(),
                stderr: Vec::new(),
                exit_code: 0,
                duration_ms: 1,
            })
        }
    }

    struct FakeTasks;

    #[async_trait]
    impl TaskRepository for FakeTasks {
        async fn list(&self) -> Result<Vec<TaskMeta>> {
            Ok(vec![])
        }
        async fn get(&self, task_id: &str) -> Result<Task> {
            if task_id == "missing" {
                return Err(Error::TaskNotFound(task_id.to_string()));
            }
            Ok(Task {
                meta: TaskMeta {
                    id: task_id.to_string(),
                    title: "Hello".to_string(),
                    module: "intro".to_string(),
                    r#type: "io".to_string(),
                    time_limit_ms: 1000,
                    memory_mb: 256,
                    starter_code: String::new(),
                },
                statement: String::new(),
                tests: vec![],
            })
        }
    }

    fn manager(max_workers: usize, max_queue: usize) -> Arc<JobManager> {
        let runner = Runner::new(Arc::new(FakeSandbox));
        JobManager::start(
            max_workers,
            max_queue,
            131_072,
            Duration::from_secs(1800),
            runner,
            Arc::new(FakeTasks),
        )
    }

    #[tokio::test]
    async fn submit_rejects_oversized_code() {
        let mgr = manager(1, 10);
        let big = "x".repeat(200_000);
        let err = mgr.submit("hello".to_string(), big, "check").await.unwrap_err();
        assert!(matches!(err, Error::CodeTooLarge { .. }));
    }

    #[tokio::test]
    async fn submit_rejects_invalid_mode() {
        let mgr = manager(1, 10);
        let err = mgr
            .submit("hello".to_string(), "code".to_string(), "bogus")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMode(_)));
    }

    #[tokio::test]
    async fn submit_rejects_unknown_task() {
        let mgr = manager(1, 10);
        let err = mgr
            .submit("missing".to_string(), "code".to_string(), "check")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn queue_full_is_rejected() {
        let mgr = manager(0, 1);
        mgr.submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();
        let err = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueueFull));
    }

    #[tokio::test]
    async fn cancel_before_dispatch_succeeds_with_zero_workers() {
        let mgr = manager(0, 10);
        let id = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();
        let status = mgr.get_job(&id).unwrap();
        assert_eq!(status.state, JobState::Queued);
        assert_eq!(status.queue_position, Some(0));

        let cancelled = mgr.cancel(&id).unwrap();
        assert!(cancelled);
        let status = mgr.get_job(&id).unwrap();
        assert_eq!(status.state, JobState::Error);
    }

    #[tokio::test]
    async fn fifo_queue_position_reflects_submission_order() {
        let mgr = manager(0, 10);
        let first = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();
        let second = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();

        assert_eq!(mgr.get_job(&first).unwrap().queue_position, Some(0));
        assert_eq!(mgr.get_job(&second).unwrap().queue_position, Some(1));
    }

    #[tokio::test]
    async fn job_runs_to_completion_with_live_workers() {
        let mgr = manager(2, 10);
        let id = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();

        for _ in 0..50 {
            if mgr.get_job(&id).unwrap().state == JobState::Done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let status = mgr.get_job(&id).unwrap();
        assert_eq!(status.state, JobState::Done);
        assert!(status.result.is_some());
    }

    #[test]
    fn unknown_job_id_returns_none() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mgr = manager(1, 10);
            assert!(mgr.get_job(&Uuid::new_v4()).is_none());
        });
    }

    #[tokio::test]
    async fn stop_lets_in_flight_job_finish_then_returns() {
        let mgr = manager(1, 10);
        let id = mgr
            .submit("hello".to_string(), "code".to_string(), "check")
            .await
            .unwrap();

        mgr.stop().await;

        let status = mgr.get_job(&id).unwrap();
        assert_eq!(status.state, JobState::Done);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mgr = manager(2, 10);
        mgr.stop().await;
        mgr.stop().await;
    }
}
