//! Compile-then-judge execution pipeline.
//!
//! A `Runner` takes a task and a submission and drives it through the
//! sandbox: compile once, then either execute once (`run`) or against every
//! test case with fail-fast semantics (`check`). Verdicts are combined with
//! strict precedence `TLE > RE > WA > OK`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Result;
use crate::job::{JobResult, Mode, TestResult, Verdict};
use crate::sandbox::{SandboxExecutor, EXIT_TIMEOUT};
use crate::tasks::Task;

/// Extra time granted on top of a task's declared time limit before a
/// sandbox invocation is killed, to absorb process startup jitter.
const GRACE_MS: u64 = 2000;
/// Floor (and multiplier base) for the compile step's own timeout.
const COMPILE_MIN_MS: u64 = 10_000;
/// Fixed overhead added to the aggregate `check` timeout budget.
const CHECK_OVERHEAD_MS: u64 = 10_000;

/// Normalizes judged output before comparison: strip `\r` entirely, then
/// trim trailing spaces and newlines.
pub fn normalize(s: &str) -> String {
    s.replace('\r', "")
        .trim_end_matches(|c| c == ' ' || c == '\n')
        .to_string()
}

fn compile_timeout_ms(per_test_ms: u64) -> u64 {
    COMPILE_MIN_MS.max(2 * per_test_ms)
}

fn check_overall_timeout_ms(per_test_ms: u64, test_count: usize) -> u64 {
    per_test_ms * (test_count.max(1) as u64) + CHECK_OVERHEAD_MS
}

pub struct Runner {
    sandbox: Arc<dyn SandboxExecutor>,
}

impl Runner {
    pub fn new(sandbox: Arc<dyn SandboxExecutor>) -> Self {
        Self { sandbox }
    }

    /// Compiles `code` against `task` and, depending on `mode`, either
    /// executes it once or judges it against every test case.
    pub async fn judge(&self, task: &Task, code: &str, mode: Mode) -> Result<JobResult> {
        let work_dir = tempfile::tempdir().map_err(crate::error::Error::from)?;
        let source_path = work_dir.path().join("main.zig");
        tokio::fs::write(&source_path, code).await?;

        let per_test_ms = task.meta.time_limit_ms;
        let compile_out = self
            .sandbox
            .run(
                &[
                    "zig".to_string(),
                    "build-exe".to_string(),
                    "main.zig".to_string(),
                    "-O".to_string(),
                    "ReleaseSmall".to_string(),
                ],
                work_dir.path(),
                b"",
                compile_timeout_ms(per_test_ms),
            )
            .await?;

        if compile_out.exit_code != 0 {
            warn!(
                task_id = %task.meta.id,
                exit_code = compile_out.exit_code,
                "compile failed"
            );
            return Ok(JobResult {
                verdict: Verdict::CE,
                stdout: String::new(),
                stderr: String::new(),
                compile_log: String::from_utf8_lossy(&compile_out.stderr).to_string(),
                time_ms: compile_out.duration_ms,
                test_results: Vec::new(),
            });
        }

        match mode {
            Mode::Run => self.judge_run(work_dir.path(), per_test_ms).await,
            Mode::Check => {
                self.judge_check(work_dir.path(), per_test_ms, task, compile_out.duration_ms)
                    .await
            }
        }
    }

    async fn judge_run(
        &self,
        work_dir: &std::path::Path,
        per_test_ms: u64,
    ) -> Result<JobResult> {
        let out = self
            .sandbox
            .run(
                &["./main".to_string()],
                work_dir,
                b"",
                per_test_ms + GRACE_MS,
            )
            .await?;

        let verdict = if out.exit_code == EXIT_TIMEOUT {
            Verdict::TLE
        } else if out.exit_code != 0 {
            Verdict::RE
        } else {
            Verdict::OK
        };

        Ok(JobResult {
            verdict,
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            compile_log: String::new(),
            time_ms: out.duration_ms,
            test_results: Vec::new(),
        })
    }

    async fn judge_check(
        &self,
        work_dir: &std::path::Path,
        per_test_ms: u64,
        task: &Task,
        compile_duration_ms: u64,
    ) -> Result<JobResult> {
        let per_test_timeout = per_test_ms + GRACE_MS;
        let overall_budget = check_overall_timeout_ms(per_test_ms, task.tests.len());
        let started = Instant::now();

        let mut test_results = Vec::with_capacity(task.tests.len());
        let mut verdict = Verdict::OK;
        let mut last_stdout = String::new();
        let mut last_stderr = String::new();
        let mut total_time_ms = compile_duration_ms;

        for (i, test) in task.tests.iter().enumerate() {
            if started.elapsed().as_millis() as u64 > overall_budget {
                warn!(overall_budget, tests_run = i, "overall check timeout exceeded");
                verdict = Verdict::TLE;
                break;
            }

            let out = self
                .sandbox
                .run(
                    &["./main".to_string()],
                    work_dir,
                    test.input.as_bytes(),
                    per_test_timeout,
                )
                .await?;

            last_stdout = String::from_utf8_lossy(&out.stdout).to_string();
            last_stderr = String::from_utf8_lossy(&out.stderr).to_string();
            total_time_ms += out.duration_ms;

            let (passed, test_verdict) = if out.exit_code == EXIT_TIMEOUT {
                (false, Verdict::TLE)
            } else if out.exit_code != 0 {
                (false, Verdict::RE)
            } else if normalize(&last_stdout) != normalize(&test.expected_output) {
                (false, Verdict::WA)
            } else {
                (true, Verdict::OK)
            };

            test_results.push(TestResult {
                test_num: i + 1,
                passed,
                expected: test.expected_output.clone(),
                actual: last_stdout.clone(),
                time_ms: out.duration_ms,
            });

            if !passed {
                debug!(test_num = i + 1, verdict = %test_verdict, "judging stopped fail-fast");
                verdict = test_verdict;
                break;
            }
        }

        Ok(JobResult {
            verdict,
            stdout: last_stdout,
            stderr: last_stderr,
            compile_log: String::new(),
            time_ms: total_time_ms,
            test_results,
        })
    }
}
