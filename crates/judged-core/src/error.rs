use std::fmt;

/// Main error type for judged-core
#[derive(Debug)]
pub enum Error {
    /// Configuration errors
    Config(String),

    /// The requested task id has no corresponding entry in the task repository
    TaskNotFound(String),

    /// The requested job id is not in the registry
    JobNotFound(String),

    /// `mode` was not one of `run` or `check`
    InvalidMode(String),

    /// Submitted code exceeded `CODE_MAX_BYTES`
    CodeTooLarge { len: usize, max: usize },

    /// The admission queue was at `max_queue` capacity
    QueueFull,

    /// Filesystem or serialization failure reading task metadata/tests
    TaskRepository(String),

    /// The sandbox executor itself could not be invoked
    SandboxUnavailable(String),

    /// Scratch directory allocation failed
    Scratch(String),

    /// Serialization errors
    Serialization(serde_json::Error),

    /// IO errors
    Io(std::io::Error),

    /// Generic errors with description
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::TaskNotFound(id) => write!(f, "Task not found: {}", id),
            Error::JobNotFound(id) => write!(f, "Job not found: {}", id),
            Error::InvalidMode(mode) => write!(f, "Invalid mode: {}", mode),
            Error::CodeTooLarge { len, max } => {
                write!(f, "Code too large: {} bytes (max {})", len, max)
            }
            Error::QueueFull => write!(f, "Queue is full"),
            Error::TaskRepository(msg) => write!(f, "Task repository error: {}", msg),
            Error::SandboxUnavailable(msg) => write!(f, "Sandbox unavailable: {}", msg),
            Error::Scratch(msg) => write!(f, "Scratch directory error: {}", msg),
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serialization(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    /// Get HTTP status code for error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::TaskNotFound(_) => 404,
            Error::JobNotFound(_) => 404,
            Error::InvalidMode(_) => 400,
            Error::CodeTooLarge { .. } => 413,
            Error::QueueFull => 429,
            Error::Config(_) => 500,
            Error::TaskRepository(_) => 500,
            Error::SandboxUnavailable(_) => 500,
            Error::Scratch(_) => 500,
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Get error category for monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::TaskNotFound(_) => "not_found",
            Error::JobNotFound(_) => "not_found",
            Error::InvalidMode(_) => "validation",
            Error::CodeTooLarge { .. } => "validation",
            Error::QueueFull => "queue_full",
            Error::TaskRepository(_) => "task_repository",
            Error::SandboxUnavailable(_) => "sandbox",
            Error::Scratch(_) => "scratch",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}
