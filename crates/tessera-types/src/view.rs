//! Read models served to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{WorkflowRecord, WorkflowState};

/// Summary row for list-by-owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowListItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: WorkflowState,
    pub total_jobs: u32,
    pub finished_jobs: u32,
}

impl From<&WorkflowRecord> for WorkflowListItem {
    fn from(record: &WorkflowRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            state: record.state,
            total_jobs: record.total_jobs,
            finished_jobs: record.finished_jobs,
        }
    }
}

/// A workflow record merged with the detail of its sub-jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: WorkflowState,
    pub total_jobs: u32,
    pub finished_jobs: u32,
    pub jobs: Vec<JobDetail>,
}

impl WorkflowDetail {
    pub fn from_record(record: &WorkflowRecord, jobs: Vec<JobDetail>) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            state: record.state,
            total_jobs: record.total_jobs,
            finished_jobs: record.finished_jobs,
            jobs,
        }
    }
}

/// Full view of one sub-job on the task-execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Backend-reported state, passed through verbatim.
    pub state: String,
    /// Stdout of the first executor of the first attempt, or empty.
    pub logs: String,
}

/// Lightweight view of one sub-job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: String,
}
