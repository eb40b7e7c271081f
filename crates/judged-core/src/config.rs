use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Runtime configuration for the judge service.
///
/// All fields have defaults matching the environment variables named in
/// the external interface spec, so `Config::default()` is always usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: String,

    #[serde(default = "default_runner_image")]
    pub runner_image: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            tasks_dir: default_tasks_dir(),
            runner_image: default_runner_image(),
        }
    }
}

fn default_tasks_dir() -> String {
    "./tasks".to_string()
}

fn default_runner_image() -> String {
    "zig-runner:0.13.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    #[serde(default = "default_job_ttl_minutes")]
    pub job_ttl_minutes: u64,

    #[serde(default = "default_code_max_bytes")]
    pub code_max_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_queue: default_max_queue(),
            job_ttl_minutes: default_job_ttl_minutes(),
            code_max_bytes: default_code_max_bytes(),
        }
    }
}

fn default_max_workers() -> usize {
    2
}

fn default_max_queue() -> usize {
    200
}

fn default_job_ttl_minutes() -> u64 {
    30
}

fn default_code_max_bytes() -> usize {
    131_072
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Honors `JUDGED_CONFIG` (a TOML file path) first, then reads the
    /// individual `TASKS_DIR` / `RUNNER_IMAGE` / `MAX_WORKERS` / `MAX_QUEUE`
    /// / `JOB_TTL_MINUTES` / `CODE_MAX_BYTES` / `HOST` / `PORT` variables
    /// over whatever the file (or the bare defaults) provided.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = if let Ok(path) = std::env::var("JUDGED_CONFIG") {
            Self::load(&path)?
        } else if Path::new("./config/default.toml").exists() {
            Self::load("./config/default.toml")?
        } else {
            Self::default()
        };

        if let Ok(v) = std::env::var("TASKS_DIR") {
            config.tasks_dir = v;
        }
        if let Ok(v) = std::env::var("RUNNER_IMAGE") {
            config.runner_image = v;
        }
        if let Ok(v) = std::env::var("MAX_WORKERS") {
            config.queue.max_workers = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid MAX_WORKERS: {}", v)))?;
        }
        if let Ok(v) = std::env::var("MAX_QUEUE") {
            config.queue.max_queue = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid MAX_QUEUE: {}", v)))?;
        }
        if let Ok(v) = std::env::var("JOB_TTL_MINUTES") {
            config.queue.job_ttl_minutes = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid JOB_TTL_MINUTES: {}", v)))?;
        }
        if let Ok(v) = std::env::var("CODE_MAX_BYTES") {
            config.queue.code_max_bytes = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid CODE_MAX_BYTES: {}", v)))?;
        }
        if let Ok(v) = std::env::var("HOST") {
            config.server.host = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            config.server.port = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", v)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.port == 0 {
            return Err(Error::Config("Invalid server port".to_string()));
        }
        if self.queue.max_workers == 0 {
            return Err(Error::Config(
                "max_workers must be > 0 (0 is only used in tests to hold jobs queued)".to_string(),
            ));
        }
        if self.queue.code_max_bytes == 0 {
            return Err(Error::Config("code_max_bytes must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn job_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.queue.job_ttl_minutes * 60)
    }
}
