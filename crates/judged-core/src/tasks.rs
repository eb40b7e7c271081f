//! Task metadata and the repository that loads it from disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single stdin/stdout pair a submission is judged against in `check` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Presentation and limits metadata for one judgeable task.
///
/// Loaded from `{TASKS_DIR}/{task_id}/meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    pub id: String,
    pub title: String,
    pub module: String,
    #[serde(default = "default_task_type")]
    pub r#type: String,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    pub memory_mb: u64,
    #[serde(default)]
    pub starter_code: String,
}

fn default_task_type() -> String {
    "io".to_string()
}

/// Runner's own default when `meta.json` omits a time limit.
fn default_time_limit_ms() -> u64 {
    3000
}

/// A task together with its free-form statement and the tests it's judged
/// against.
#[derive(Debug, Clone)]
pub struct Task {
    pub meta: TaskMeta,
    pub statement: String,
    pub tests: Vec<TestCase>,
}

/// Read-only access to the task catalog.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<TaskMeta>>;
    async fn get(&self, task_id: &str) -> Result<Task>;
}

/// Loads tasks from `{TASKS_DIR}/{task_id}/{meta.json,statement.md,tests/}`.
///
/// Tests are `tests/*.in` paired with the same-stemmed `*.out`, ordered
/// lexicographically by `.in` filename; an `.in` file with no matching
/// `.out` is skipped.
pub struct FsTaskRepository {
    root: PathBuf,
}

impl FsTaskRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    fn read_meta(dir: &Path) -> Result<TaskMeta> {
        let path = dir.join("meta.json");
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::TaskRepository(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::TaskRepository(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn read_statement(dir: &Path) -> Result<String> {
        let path = dir.join("statement.md");
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::TaskRepository(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn read_tests(dir: &Path) -> Result<Vec<TestCase>> {
        let tests_dir = dir.join("tests");
        if !tests_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut in_files: Vec<PathBuf> = std::fs::read_dir(&tests_dir)
            .map_err(|e| {
                Error::TaskRepository(format!("failed to read {}: {}", tests_dir.display(), e))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("in"))
            .collect();
        in_files.sort();

        let mut tests = Vec::with_capacity(in_files.len());
        for in_path in in_files {
            let out_path = in_path.with_extension("out");
            if !out_path.exists() {
                continue;
            }
            let input = std::fs::read_to_string(&in_path).map_err(|e| {
                Error::TaskRepository(format!("failed to read {}: {}", in_path.display(), e))
            })?;
            let expected_output = std::fs::read_to_string(&out_path).map_err(|e| {
                Error::TaskRepository(format!("failed to read {}: {}", out_path.display(), e))
            })?;
            tests.push(TestCase {
                input,
                expected_output,
            });
        }
        Ok(tests)
    }
}

#[async_trait]
impl TaskRepository for FsTaskRepository {
    async fn list(&self) -> Result<Vec<TaskMeta>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut metas = Vec::new();
            let entries = std::fs::read_dir(&root).map_err(|e| {
                Error::TaskRepository(format!("failed to read {}: {}", root.display(), e))
            })?;
            for entry in entries {
                let entry = entry
                    .map_err(|e| Error::TaskRepository(format!("directory entry error: {}", e)))?;
                if !entry.path().is_dir() {
                    continue;
                }
                if !entry.path().join("meta.json").exists() {
                    continue;
                }
                metas.push(Self::read_meta(&entry.path())?);
            }
            metas.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(metas)
        })
        .await
        .map_err(|e| Error::TaskRepository(format!("task listing panicked: {}", e)))?
    }

    async fn get(&self, task_id: &str) -> Result<Task> {
        let dir = self.task_dir(task_id);
        if !dir.is_dir() {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        let task_id = task_id.to_string();
        tokio::task::spawn_blocking(move || {
            let meta = Self::read_meta(&dir).map_err(|_| Error::TaskNotFound(task_id.clone()))?;
            let statement = Self::read_statement(&dir)?;
            let tests = Self::read_tests(&dir)?;
            Ok(Task {
                meta,
                statement,
                tests,
            })
        })
        .await
        .map_err(|e| Error::TaskRepository(format!("task load panicked: {}", e)))?
    }
}
