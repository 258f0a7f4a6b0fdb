//! Deployment models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one submission attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Pending or running: blocks a new submission for the same service
    pub fn is_active(&self) -> bool {
        matches!(self, DeploymentStatus::Pending | DeploymentStatus::Running)
    }

    /// Running or completed: the deployment stop/restart/logs act upon
    pub fn is_established(&self) -> bool {
        matches!(self, DeploymentStatus::Running | DeploymentStatus::Completed)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to run a service on the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub service_id: Uuid,
    pub status: DeploymentStatus,
    /// Scheduler job id
    pub job_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    pub deployed_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion sequence assigned by the store; orders deployments created
    /// within the same clock tick
    #[serde(default)]
    pub sequence: u64,
}

impl Deployment {
    /// Create a new pending deployment
    pub fn pending(service_id: Uuid, job_id: String, deployed_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service_id,
            status: DeploymentStatus::Pending,
            job_id,
            started_at: None,
            completed_at: None,
            error_msg: None,
            deployed_by,
            created_at: now,
            updated_at: now,
            sequence: 0,
        }
    }

    /// Move to `status`, stamping start and completion times on first entry
    pub fn advance(&mut self, status: DeploymentStatus, error_msg: Option<String>) {
        let now = Utc::now();
        match status {
            DeploymentStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(now);
            }
            DeploymentStatus::Completed | DeploymentStatus::Failed
                if self.completed_at.is_none() =>
            {
                self.completed_at = Some(now);
            }
            _ => {}
        }
        if error_msg.is_some() {
            self.error_msg = error_msg;
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Ordering key: creation time, then insertion sequence
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}
