use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use judged_core::TaskMeta;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list))
        .route("/tasks/:id", get(get_one))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<TaskMeta>>, ApiError> {
    let tasks = state.tasks.list().await?;
    Ok(Json(tasks))
}

/// Public view of a task: metadata plus the number of hidden tests, but
/// never the tests themselves (those would let a submission hardcode
/// expected output).
#[derive(Debug, Serialize)]
struct TaskDetail {
    #[serde(flatten)]
    meta: TaskMeta,
    test_count: usize,
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskDetail>, ApiError> {
    let task = state.tasks.get(&id).await?;
    Ok(Json(TaskDetail {
        test_count: task.tests.len(),
        meta: task.meta,
    }))
}
