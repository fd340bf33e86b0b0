use thiserror::Error;

use crate::types::JobId;

/// Result type for engine-boundary operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by the queue engine boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Process handler already registered for job type: {0}")]
    HandlerAlreadyRegistered(String),

    #[error("{0}")]
    Backend(String),
}

impl EngineError {
    /// Create a backend error with the given message
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Failure reported by a job handler — drives the job to the failed state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct JobError(String);

impl JobError {
    /// Create a job error with the given message
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for JobError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}
