use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use judged_core::{Config, DockerSandbox, FsTaskRepository, JobManager, Runner, TaskRepository};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "judged", version, about = "Sandboxed code judging service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Server {
        #[arg(long, env = "HOST")]
        host: Option<String>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Submit a solution and wait for its verdict
    Submit {
        #[arg(long)]
        task_id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "check")]
        mode: String,
    },
    /// Check a job's status
    Status {
        /// Job id, as printed by `submit`
        id: Uuid,
    },
    /// Cancel a queued job
    Cancel {
        /// Job id, as printed by `submit`
        id: Uuid,
    },
    /// Inspect the task catalog
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List every task
    List,
    /// Show one task's metadata
    Get {
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Server { host, port } => run_server(config, host, port).await,
        Commands::Submit {
            task_id,
            file,
            mode,
        } => submit(config, task_id, file, mode).await,
        Commands::Status { id } => status(config, id).await,
        Commands::Cancel { id } => cancel(config, id).await,
        Commands::Tasks { action } => tasks(config, action).await,
    }
}

async fn run_server(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let tasks = Arc::new(FsTaskRepository::new(config.tasks_dir.clone())) as Arc<dyn TaskRepository>;
    let manager = build_manager(&config, tasks.clone());
    let state = judged_api::AppState::new(manager, tasks);

    info!("starting judged server");
    judged_api::run(config, state).await?;
    Ok(())
}

fn build_manager(config: &Config, tasks: Arc<dyn TaskRepository>) -> Arc<JobManager> {
    let sandbox = Arc::new(DockerSandbox::new(config.runner_image.clone()));
    let runner = Runner::new(sandbox);
    JobManager::start(
        config.queue.max_workers,
        config.queue.max_queue,
        config.queue.code_max_bytes,
        config.job_ttl(),
        runner,
        tasks,
    )
}

/// Submits `file` against `task_id` and blocks, polling the in-process
/// manager, until the job reaches a terminal state.
async fn submit(
    config: Config,
    task_id: String,
    file: PathBuf,
    mode: String,
) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(&file)?;
    let tasks = Arc::new(FsTaskRepository::new(config.tasks_dir.clone())) as Arc<dyn TaskRepository>;
    let manager = build_manager(&config, tasks);

    let id = manager.submit(task_id, code, &mode).await?;
    println!("submitted job {}", id);

    loop {
        let status = manager
            .get_job(&id)
            .expect("job was just submitted to this manager");
        if status.state.is_terminal() {
            println!("{}", serde_json::to_string_pretty(&status)?);
            break;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    Ok(())
}

/// Reports a job's status.
///
/// Because the CLI holds no persistent state between invocations, this
/// only reports on jobs submitted by a manager still running in this same
/// process (i.e. it's primarily useful for scripting around `submit`); a
/// long-lived deployment should query the HTTP API instead.
async fn status(config: Config, id: Uuid) -> anyhow::Result<()> {
    let tasks = Arc::new(FsTaskRepository::new(config.tasks_dir.clone())) as Arc<dyn TaskRepository>;
    let manager = build_manager(&config, tasks);
    match manager.get_job(&id) {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("job {} not found", id),
    }
    Ok(())
}

async fn cancel(config: Config, id: Uuid) -> anyhow::Result<()> {
    let tasks = Arc::new(FsTaskRepository::new(config.tasks_dir.clone())) as Arc<dyn TaskRepository>;
    let manager = build_manager(&config, tasks);
    if manager.get_job(&id).is_none() {
        println!("job {} not found", id);
        return Ok(());
    }
    let cancelled = manager.cancel(&id)?;
    println!("cancelled: {}", cancelled);
    Ok(())
}

async fn tasks(config: Config, action: TaskAction) -> anyhow::Result<()> {
    let repo = FsTaskRepository::new(config.tasks_dir.clone());
    match action {
        TaskAction::List => {
            let metas = repo.list().await?;
            println!("{}", serde_json::to_string_pretty(&metas)?);
        }
        TaskAction::Get { id } => {
            let task = repo.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&task.meta)?);
        }
    }
    Ok(())
}
