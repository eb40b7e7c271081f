//! Sandboxed process execution.
//!
//! The Runner never shells out to `docker` directly; it goes through a
//! `SandboxExecutor` so tests can swap in a fake that never touches the
//! filesystem or a container runtime.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, warn};

use crate::error::{Error, Result};

/// Exit code convention for a timed-out invocation.
pub const EXIT_TIMEOUT: i32 = 124;
/// Exit code convention for missing tooling (e.g. the compiler isn't on PATH).
pub const EXIT_TOOLING_MISSING: i32 = 127;

/// The outcome of one sandboxed invocation.
#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl SandboxOutput {
    pub fn timed_out(duration_ms: u64) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: EXIT_TIMEOUT,
            duration_ms,
        }
    }

    pub fn tooling_missing(diagnostic: String, duration_ms: u64) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: diagnostic.into_bytes(),
            exit_code: EXIT_TOOLING_MISSING,
            duration_ms,
        }
    }
}

/// Runs a single command, bounded by a wall-clock timeout, inside an
/// isolated environment rooted at `work_dir`.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        stdin_bytes: &[u8],
        wall_timeout_ms: u64,
    ) -> Result<SandboxOutput>;
}

/// Shells out to `docker run` per invocation, mounting `work_dir` read-write
/// at `/workspace` inside a fresh, disposable container.
pub struct DockerSandbox {
    image: String,
}

impl DockerSandbox {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

#[async_trait]
impl SandboxExecutor for DockerSandbox {
    async fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        stdin_bytes: &[u8],
        wall_timeout_ms: u64,
    ) -> Result<SandboxOutput> {
        if command.is_empty() {
            return Err(Error::SandboxUnavailable("empty command".to_string()));
        }

        let mount = format!("{}:/workspace", work_dir.display());
        let mut args: Vec<String> = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
            "--network".to_string(),
            "none".to_string(),
            "--cpus".to_string(),
            "1".to_string(),
            "--memory".to_string(),
            "512m".to_string(),
            "--pids-limit".to_string(),
            "128".to_string(),
            "-v".to_string(),
            mount,
            "-w".to_string(),
            "/workspace".to_string(),
            self.image.clone(),
        ];
        args.extend(command.iter().cloned());

        let spawn_started = std::time::Instant::now();
        let mut child = match Command::new("docker")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(error = %e, image = %self.image, "sandbox tooling unavailable");
                return Ok(SandboxOutput::tooling_missing(
                    format!("failed to spawn docker: {}", e),
                    spawn_started.elapsed().as_millis() as u64,
                ));
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(stdin_bytes).await;
            let _ = stdin.shutdown().await;
        }

        let started = std::time::Instant::now();
        let wait = timeout(Duration::from_millis(wall_timeout_ms), child.wait_with_output());

        match wait.await {
            Ok(Ok(output)) => Ok(SandboxOutput {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.status.code().unwrap_or(EXIT_TOOLING_MISSING),
                duration_ms: started.elapsed().as_millis() as u64,
            }),
            Ok(Err(e)) => Err(Error::SandboxUnavailable(format!(
                "docker run failed: {}",
                e
            ))),
            Err(_) => {
                warn!(wall_timeout_ms, "sandbox invocation timed out, killing container");
                Ok(SandboxOutput::timed_out(started.elapsed().as_millis() as u64))
            }
        }
    }
}
