//! Workflow run records and their lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a single workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    #[default]
    Unknown,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl WorkflowState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored state string is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown workflow state: {0}")]
pub struct ParseStateError(pub String);

impl FromStr for WorkflowState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "RUNNING" => Ok(Self::Running),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

/// Persisted state of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: Uuid,
    /// Identifies the execution unit on the task queue; used to target cancellation.
    pub task_handle: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub total_jobs: u32,
    pub finished_jobs: u32,
    pub state: WorkflowState,
    /// Append-only.
    pub job_ids: Vec<String>,
}

impl WorkflowRecord {
    /// Create the initial record for a freshly scheduled run.
    pub fn new(id: Uuid, task_handle: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id,
            task_handle: task_handle.into(),
            created_at: Utc::now(),
            created_by: created_by.into(),
            total_jobs: 0,
            finished_jobs: 0,
            state: WorkflowState::Unknown,
            job_ids: Vec::new(),
        }
    }

    /// Move to `next` unless the record is already terminal.
    ///
    /// Returns `true` when the state actually changed.
    pub fn transition(&mut self, next: WorkflowState) -> bool {
        if self.state.is_terminal() || self.state == next {
            return false;
        }
        self.state = next;
        true
    }

    /// Record a submitted sub-job id. Duplicates are ignored.
    pub fn push_job(&mut self, job_id: impl Into<String>) -> bool {
        let job_id = job_id.into();
        if self.job_ids.contains(&job_id) {
            return false;
        }
        self.job_ids.push(job_id);
        true
    }
}
