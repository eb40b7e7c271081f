//! Job types and definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique job identifier
pub type JobId = Uuid;

/// `check` judges against the task's test suite; `run` executes once with
/// empty stdin and classifies only by exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Run,
    Check,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "run" => Some(Mode::Run),
            "check" => Some(Mode::Check),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Run => write!(f, "run"),
            Mode::Check => write!(f, "check"),
        }
    }
}

/// The categorical outcome of a judged submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Compile error
    CE,
    /// Time limit exceeded
    TLE,
    /// Runtime error
    RE,
    /// Wrong answer
    WA,
    /// All tests passed
    OK,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::CE => "CE",
            Verdict::TLE => "TLE",
            Verdict::RE => "RE",
            Verdict::WA => "WA",
            Verdict::OK => "OK",
        };
        write!(f, "{}", s)
    }
}

/// Job execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    /// Check if job is terminal (won't change)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// One test case's outcome within a `check`-mode judging run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_num: usize,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    pub time_ms: u64,
}

/// The structured result of a single Runner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub compile_log: String,
    pub time_ms: u64,
    pub test_results: Vec<TestResult>,
}

/// The immutable request a job was submitted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub task_id: String,
    pub code: String,
    pub mode: Mode,
}

/// A unit of work tracked by the Job Manager.
///
/// Mutated only by the Job Manager, and only while holding its registry
/// lock; workers borrow these fields under that same lock (see
/// `manager::JobManager`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub state: JobState,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,

    pub result: Option<JobResult>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            request,
            state: JobState::Queued,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error_message: None,
        }
    }

    /// Transition `Queued -> Running`.
    pub fn mark_started(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(chrono::Utc::now());
    }

    /// Transition into the terminal `Done` state with a result.
    pub fn mark_done(&mut self, result: JobResult) {
        self.state = JobState::Done;
        self.result = Some(result);
        self.finished_at = Some(chrono::Utc::now());
    }

    /// Transition into the terminal `Error` state with a message.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.state = JobState::Error;
        self.error_message = Some(message.into());
        self.finished_at = Some(chrono::Utc::now());
    }

    /// Duration of the run in milliseconds, once both timestamps are set.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => {
                Some((finished - started).num_milliseconds().max(0) as u64)
            }
            _ => None,
        }
    }
}

/// Observable projection of a Job, returned by `JobManager::get_job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Only set while `state == Queued`.
    pub queue_position: Option<usize>,
    /// Only set while `state == Queued`.
    pub eta_ms: Option<u64>,
    /// Only set while `state == Running`.
    pub running_for_ms: Option<u64>,

    pub result: Option<JobResult>,
    pub error_message: Option<String>,
}
