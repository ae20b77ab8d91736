//! Provisioning job record and its status machine.
//!
//! Status lifecycle: `pending -> running -> {completed, failed}`. Terminal
//! states are final; the store rejects any transition out of them. The job
//! engine is the only writer of status, progress, and timestamps after
//! creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FabricConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A tracked provisioning job with its immutable configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningJob {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub template_id: Option<u64>,
    /// Snapshot of the configuration the job was created with. Never
    /// modified after creation, even if the source template changes.
    pub fabric_config: FabricConfig,
    pub status: JobStatus,
    /// 0–100, monotonically non-decreasing while running.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningJob {
    /// Copy with controller credentials masked, for API responses.
    pub fn redacted(&self) -> Self {
        Self {
            fabric_config: self.fabric_config.redacted(),
            ..self.clone()
        }
    }
}

/// Scalar view of a job for list endpoints — no config payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: u64,
    pub name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ProvisioningJob> for JobSummary {
    fn from(job: &ProvisioningJob) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            status: job.status,
            progress: job.progress,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_completed_and_failed() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }
}
