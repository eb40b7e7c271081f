use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use judged_core::JobStatus;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit", post(submit))
        .route("/jobs/:id", get(status).delete(cancel))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub task_id: String,
    pub code: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "check".to_string()
}

async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let id = state
        .manager
        .submit(req.task_id, req.code, &req.mode)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "job_id": id }))))
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
    state
        .manager
        .get_job(&id)
        .map(Json)
        .ok_or_else(|| ApiError(judged_core::Error::JobNotFound(id.to_string())))
}

/// Cancels a still-queued job. Returns 200 with `{cancelled: true}` on
/// success; 400 with `{cancelled: false}` if the job is unknown, already
/// running, or already terminal.
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let cancelled = state.manager.cancel(&id)?;
    let status = if cancelled {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(serde_json::json!({ "cancelled": cancelled }))))
}
