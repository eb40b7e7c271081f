//! End-to-end coverage of the HTTP surface, driven straight at the `Router`
//! via `tower::ServiceExt::oneshot` — no socket required.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use judged_api::state::AppState;
use judged_api::server::build_router;
use judged_core::{
    Error, JobManager, Result, Runner, SandboxExecutor, SandboxOutput, Task, TaskMeta,
    TaskRepository,
};

/// Compiles instantly, then echoes whatever stdin it was given.
struct EchoSandbox;

#[async_trait]
impl SandboxExecutor for EchoSandbox {
    async fn run(
        &self,
        command: &[String],
        _work_dir: &Path,
        stdin: &[u8],
        _wall_timeout_ms: u64,
    ) -> Result<SandboxOutput> {
        if command.first().map(String::as_str) == Some("zig") {
            return Ok(SandboxOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                exit_code: 0,
                duration_ms: 2,
            });
        }
        Ok(SandboxOutput {
            stdout: stdin.to_vec(),
            stderr: Vec::new(),
            exit_code: 0,
            duration_ms: 1,
        })
    }
}

struct FixedTasks;

#[async_trait]
impl TaskRepository for FixedTasks {
    async fn list(&self) -> Result<Vec<TaskMeta>> {
        Ok(vec![TaskMeta {
            id: "echo".to_string(),
            title: "Echo".to_string(),
            module: "intro".to_string(),
            r#type: "io".to_string(),
            time_limit_ms: 1000,
            memory_mb: 256,
            starter_code: String::new(),
        }])
    }

    async fn get(&self, task_id: &str) -> Result<Task> {
        if task_id != "echo" {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        Ok(Task {
            meta: TaskMeta {
                id: "echo".to_string(),
                title: "Echo".to_string(),
                module: "intro".to_string(),
                r#type: "io".to_string(),
                time_limit_ms: 1000,
                memory_mb: 256,
                starter_code: String::new(),
            },
            statement: "Print back the input line.".to_string(),
            tests: vec![judged_core::TestCase {
                input: "hello\n".to_string(),
                expected_output: "hello\n".to_string(),
            }],
        })
    }
}

fn app_with(max_workers: usize) -> axum::Router {
    let runner = Runner::new(Arc::new(EchoSandbox));
    let manager = JobManager::start(
        max_workers,
        10,
        131_072,
        Duration::from_secs(1800),
        runner,
        Arc::new(FixedTasks),
    );
    build_router(AppState::new(manager, Arc::new(FixedTasks)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_pool_shape() {
    let app = app_with(2);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workers"], 2);
}

#[tokio::test]
async fn tasks_list_and_get_round_trip() {
    let app = app_with(0);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tasks = body_json(response).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/tasks/echo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await;
    assert_eq!(task["id"], "echo");
    assert_eq!(task["test_count"], 1);
}

#[tokio::test]
async fn unknown_task_is_404() {
    let app = app_with(0);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/tasks/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_then_poll_to_done() {
    let app = app_with(2);

    let submit_body = json!({"task_id": "echo", "code": "pub fn main() void {}", "mode": "check"});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .header("content-type", "application/json")
                .body(Body::from(submit_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let submitted = body_json(response).await;
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let mut last_status = Value::Null;
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        last_status = body_json(response).await;
        if last_status["state"] == "done" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(last_status["state"], "done");
    assert_eq!(last_status["result"]["verdict"], "OK");
}

#[tokio::test]
async fn submit_rejects_unknown_mode() {
    let app = app_with(1);
    let submit_body = json!({"task_id": "echo", "code": "x", "mode": "bogus"});
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .header("content-type", "application/json")
                .body(Body::from(submit_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_rejects_unknown_task() {
    let app = app_with(1);
    let submit_body = json!({"task_id": "nope", "code": "x", "mode": "check"});
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .header("content-type", "application/json")
                .body(Body::from(submit_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_before_dispatch_then_status_is_error() {
    // Zero workers: the submitted job can never leave `Queued` on its own.
    let app = app_with(0);
    let submit_body = json!({"task_id": "echo", "code": "x", "mode": "check"});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .header("content-type", "application/json")
                .body(Body::from(submit_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let submitted = body_json(response).await;
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = body_json(response).await;
    assert_eq!(cancelled["cancelled"], true);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["state"], "error");
    assert_eq!(status["error_message"], "Cancelled by user");
}

#[tokio::test]
async fn unknown_job_status_is_404() {
    let app = app_with(1);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
