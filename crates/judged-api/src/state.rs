use std::sync::Arc;

use judged_core::{JobManager, TaskRepository};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { manager, tasks }
    }
}
