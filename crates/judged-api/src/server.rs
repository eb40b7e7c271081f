use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use judged_core::{Config, Error, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

/// Runs the HTTP server until the process is killed.
pub async fn run(config: Config, state: AppState) -> Result<()> {
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| Error::config(format!("invalid host: {}", e)))?,
        config.server.port,
    ));

    let manager = state.manager.clone();
    let app = build_router(state);

    info!("judged API listening on http://{}", addr);
    log_routes();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::from)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(manager))
        .await
        .map_err(Error::from)?;

    Ok(())
}

/// Waits for Ctrl+C, then cooperatively stops the job manager's worker pool
/// and reaper before axum finishes draining in-flight HTTP connections.
async fn shutdown_signal(manager: std::sync::Arc<judged_core::JobManager>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received, stopping worker pool");
        manager.stop().await;
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .merge(crate::routes::health::router())
        .merge(crate::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn log_routes() {
    info!("available routes:");
    info!("  GET    /health        - health check");
    info!("  GET    /tasks         - list tasks");
    info!("  GET    /tasks/:id     - get task");
    info!("  POST   /submit        - submit a job");
    info!("  GET    /jobs/:id      - job status");
    info!("  DELETE /jobs/:id      - cancel a queued job");
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "judged",
        "version": judged_core::VERSION,
        "status": "operational",
    }))
}
