use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Job is persisted and waiting for a process handler
    Waiting,

    /// Job is currently being processed
    Active,

    /// Job completed successfully
    Completed,

    /// Job failed
    Failed,
}

impl JobState {
    /// Check if the job is in a terminal state (completed or failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Persisted job data as seen at the engine boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier
    pub job_id: JobId,

    /// Job type identifier for handler dispatch
    pub job_type: String,

    /// Caller-supplied payload
    pub payload: serde_json::Value,

    /// Current lifecycle state
    pub state: JobState,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job was last updated
    pub updated_at: DateTime<Utc>,

    /// Last error message (if the job failed)
    pub last_error: Option<String>,
}

impl JobRecord {
    /// Create a new waiting job record
    pub fn new(job_id: JobId, job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            job_type: job_type.into(),
            payload,
            state: JobState::Waiting,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Mark the job as actively processing
    pub fn start(&mut self) {
        self.state = JobState::Active;
        self.updated_at = Utc::now();
    }

    /// Complete the job successfully
    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.updated_at = Utc::now();
    }

    /// Fail the job with an error message
    pub fn fail(&mut self, error: String) {
        self.state = JobState::Failed;
        self.last_error = Some(error);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_update_state_and_timestamp() {
        let mut record = JobRecord::new(JobId(1), "test_job", serde_json::json!({}));
        assert_eq!(record.state, JobState::Waiting);
        assert!(!record.state.is_terminal());

        record.start();
        assert_eq!(record.state, JobState::Active);

        record.fail("boom".to_string());
        assert_eq!(record.state, JobState::Failed);
        assert!(record.state.is_terminal());
        assert_eq!(record.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn state_names() {
        assert_eq!(JobState::Waiting.name(), "waiting");
        assert_eq!(JobState::Active.name(), "active");
        assert_eq!(JobState::Completed.name(), "completed");
        assert_eq!(JobState::Failed.name(), "failed");
    }
}
