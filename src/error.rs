use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Failed to build command: {0}")]
    CommandBuild(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("GPU discovery failed: {0}")]
    Discovery(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
