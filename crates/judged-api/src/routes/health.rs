use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.manager.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": judged_core::VERSION,
        "workers": stats.workers,
        "queue_size": stats.queue_size,
        "jobs_count": stats.jobs_count,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use judged_core::{JobManager, Result, Runner, SandboxExecutor, SandboxOutput, Task, TaskMeta, TaskRepository};

    use super::*;

    struct NullSandbox;

    #[async_trait]
    impl SandboxExecutor for NullSandbox {
        async fn run(
            &self,
            _command: &[String],
            _work_dir: &std::path::Path,
            _stdin: &[u8],
            _timeout_ms: u64,
        ) -> Result<SandboxOutput> {
            Ok(SandboxOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                exit_code: 0,
                duration_ms: 0,
            })
        }
    }

    struct EmptyTasks;

    #[async_trait]
    impl TaskRepository for EmptyTasks {
        async fn list(&self) -> Result<Vec<TaskMeta>> {
            Ok(vec![])
        }
        async fn get(&self, task_id: &str) -> Result<Task> {
            Err(judged_core::Error::TaskNotFound(task_id.to_string()))
        }
    }

    #[tokio::test]
    async fn health_reports_pool_stats() {
        let runner = Runner::new(Arc::new(NullSandbox));
        let manager = JobManager::start(2, 10, 131_072, Duration::from_secs(1800), runner, Arc::new(EmptyTasks));
        let state = AppState::new(manager, Arc::new(EmptyTasks));

        let response = health(State(state)).await;
        assert_eq!(response.0["status"], "ok");
        assert_eq!(response.0["workers"], 2);
        assert_eq!(response.0["queue_size"], 0);
        assert_eq!(response.0["jobs_count"], 0);
    }
}
