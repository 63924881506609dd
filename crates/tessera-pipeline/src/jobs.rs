//! Sub-job status from the task-execution backend.
//!
//! Each pipeline step runs as a task on a GA4GH TES backend. Status lookups
//! are best effort: a job the backend cannot describe is simply absent from
//! the result, never an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tessera_types::{JobDetail, JobListItem};

/// Default timeout for backend requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read access to sub-job status.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Full view of one job, including its stdout.
    async fn get_detail(&self, job_id: &str, token: &str) -> Option<JobDetail>;

    /// Minimal view of one job.
    async fn get_list_item(&self, job_id: &str, token: &str) -> Option<JobListItem>;

    /// Detail views for `job_ids`, in order, skipping absent jobs.
    async fn get_detail_list(&self, job_ids: &[String], token: &str) -> Vec<JobDetail> {
        let mut out = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            if let Some(job) = self.get_detail(id, token).await {
                out.push(job);
            }
        }
        out
    }

    /// List views for `job_ids`, in order, skipping absent jobs.
    async fn get_list(&self, job_ids: &[String], token: &str) -> Vec<JobListItem> {
        let mut out = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            if let Some(job) = self.get_list_item(id, token).await {
                out.push(job);
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TesTask {
    id: String,
    creation_time: DateTime<Utc>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    logs: Vec<TesTaskLog>,
}

#[derive(Debug, Deserialize)]
struct TesTaskLog {
    #[serde(default)]
    logs: Vec<TesExecutorLog>,
}

#[derive(Debug, Deserialize)]
struct TesExecutorLog {
    #[serde(default)]
    stdout: Option<String>,
}

impl TesTask {
    fn first_stdout(&self) -> String {
        self.logs
            .first()
            .and_then(|attempt| attempt.logs.first())
            .and_then(|exec| exec.stdout.clone())
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for `GET {base}/v1/tasks/{id}`.
#[derive(Debug, Clone)]
pub struct TesJobClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl TesJobClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, job_id: &str, token: &str, full: bool) -> Option<TesTask> {
        let url = format!("{}/v1/tasks/{}", self.base_url, job_id);
        let mut request = self.http.get(&url).bearer_auth(token).timeout(self.timeout);
        if full {
            request = request.query(&[("view", "FULL")]);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Job status request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(job_id, status = %response.status(), "Job status unavailable");
            return None;
        }
        match response.json::<TesTask>().await {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Undecodable job status");
                None
            }
        }
    }
}

#[async_trait]
impl JobStatusSource for TesJobClient {
    async fn get_detail(&self, job_id: &str, token: &str) -> Option<JobDetail> {
        let task = self.fetch(job_id, token, true).await?;
        let logs = task.first_stdout();
        Some(JobDetail {
            id: task.id,
            created_at: task.creation_time,
            state: task.state,
            logs,
        })
    }

    async fn get_list_item(&self, job_id: &str, token: &str) -> Option<JobListItem> {
        let task = self.fetch(job_id, token, false).await?;
        Some(JobListItem {
            id: task.id,
            created_at: task.creation_time,
            state: task.state,
        })
    }
}
