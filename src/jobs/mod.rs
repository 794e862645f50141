//! Job execution records -- the strongly-typed view of a stored job document.

pub mod document;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution state of a job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    Running,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Running => write!(f, "running"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    /// Accepts the status spellings the job pipeline has used over time.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "completed" | "success" => Ok(JobStatus::Succeeded),
            "failed" | "error" => Ok(JobStatus::Failed),
            "running" | "pending" | "queued" | "started" => Ok(JobStatus::Running),
            other => Err(format!("unrecognized job status '{}'", other)),
        }
    }
}

/// Failure detail attached to a failed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    /// Category tag, e.g. `ActivityFailure` or `ChildWorkflowFailure`.
    pub error_name: Option<String>,
    pub root_cause_message: Option<String>,
    pub failed_activity_name: Option<String>,
}

/// One execution attempt of an artifact job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up. Absent for jobs still queued.
    pub started_at: Option<DateTime<Utc>>,
    /// Present only for succeeded/failed jobs, never earlier than `created_at`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only when `status` is `Failed`.
    pub error: Option<JobError>,
    pub artifact_type_id: Option<String>,
}

impl JobRecord {
    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Wall-clock run time, when both ends are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        let completed = self.completed_at?;
        let millis = (completed - self.created_at).num_milliseconds();
        (millis >= 0).then(|| millis as f64 / 1000.0)
    }

    /// Time spent waiting in the queue. Only positive waits count.
    pub fn pending_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let millis = (started - self.created_at).num_milliseconds();
        (millis > 0).then(|| millis as f64 / 1000.0)
    }

    pub fn error_name(&self) -> Option<&str> {
        self.error.as_ref()?.error_name.as_deref()
    }

    pub fn root_cause_message(&self) -> Option<&str> {
        self.error.as_ref()?.root_cause_message.as_deref()
    }

    pub fn failed_activity_name(&self) -> Option<&str> {
        self.error.as_ref()?.failed_activity_name.as_deref()
    }
}
