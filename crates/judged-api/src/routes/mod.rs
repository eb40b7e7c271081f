pub mod health;
pub mod jobs;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Job and task-catalog routes, at the literal top-level paths named in
/// the spec (`/submit`, `/jobs/:id`, `/tasks`, `/tasks/:id`) — no version
/// prefix.
pub fn router() -> Router<AppState> {
    Router::new().merge(jobs::router()).merge(tasks::router())
}
