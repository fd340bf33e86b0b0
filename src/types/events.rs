use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Lifecycle events emitted by the in-memory engine
///
/// Tests subscribe to these to wait deterministically for a job to settle
/// instead of polling job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// Job was persisted
    Enqueued {
        job_id: JobId,
        job_type: String,
        at: DateTime<Utc>,
    },

    /// Job was handed to a process handler
    Started {
        job_id: JobId,
        job_type: String,
        at: DateTime<Utc>,
    },

    /// Job completed successfully
    Completed {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Job failed
    Failed {
        job_id: JobId,
        error: String,
        at: DateTime<Utc>,
    },

    /// Job was removed from the backing store
    Removed {
        job_id: JobId,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Started { .. } => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Removed { .. } => "removed",
        }
    }

    /// Get the job ID from any event
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Enqueued { job_id, .. } => *job_id,
            Self::Started { job_id, .. } => *job_id,
            Self::Completed { job_id, .. } => *job_id,
            Self::Failed { job_id, .. } => *job_id,
            Self::Removed { job_id, .. } => *job_id,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. } => at,
            Self::Started { at, .. } => at,
            Self::Completed { at, .. } => at,
            Self::Failed { at, .. } => at,
            Self::Removed { at, .. } => at,
        }
    }
}
