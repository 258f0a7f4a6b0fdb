//! Scheduler client adapter
//!
//! The orchestrator talks to the cluster scheduler only through
//! [`SchedulerClient`]. The adapter holds no state between calls.

pub mod logs;
pub mod nomad;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::OrchestratorError;

pub use nomad::{NomadClient, NomadOptions};

/// Lazy sequence of log lines. Dropping it releases the underlying connection.
pub type LogStream = BoxStream<'static, Result<String, OrchestratorError>>;

/// Job status as reported by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerJobStatus {
    Pending,
    Running,
    Dead,
    /// Any status this orchestrator does not know about
    Unknown(String),
}

impl SchedulerJobStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            nomad_api::JOB_STATUS_PENDING => SchedulerJobStatus::Pending,
            nomad_api::JOB_STATUS_RUNNING => SchedulerJobStatus::Running,
            nomad_api::JOB_STATUS_DEAD => SchedulerJobStatus::Dead,
            other => SchedulerJobStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SchedulerJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerJobStatus::Pending => f.write_str("pending"),
            SchedulerJobStatus::Running => f.write_str("running"),
            SchedulerJobStatus::Dead => f.write_str("dead"),
            SchedulerJobStatus::Unknown(status) => write!(f, "unknown({})", status),
        }
    }
}

/// A job known to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: SchedulerJobStatus,
    pub modify_index: Option<u64>,
}

/// Result of a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Found(JobSnapshot),
    NotFound,
}

/// Acknowledgement of a job write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub job_id: String,
    pub eval_id: String,
    pub job_modify_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
}

/// Resource usage of the most recent execution instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceUsage {
    pub cpu_ticks: f64,
    pub memory_bytes: u64,
    pub instance_id: String,
    pub instance_status: String,
    pub node_id: String,
}

/// Usage report; `NoInstance` is a successful answer for jobs not yet placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageStats {
    Available(InstanceUsage),
    NoInstance,
}

/// Typed access to the external job scheduler
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Register a rendered job document under `job_id`
    async fn submit(&self, job_document: &str, job_id: &str)
        -> Result<SubmitAck, OrchestratorError>;

    /// Stop and purge a job; an absent job is not an error
    async fn cancel(&self, job_id: &str) -> Result<(), OrchestratorError>;

    /// Current status of a job
    async fn status_of(&self, job_id: &str) -> Result<JobState, OrchestratorError>;

    /// Re-register the current job with an index-enforced write
    async fn restart(&self, job_id: &str) -> Result<SubmitAck, OrchestratorError>;

    /// Log lines of `task_name` in the most recent execution instance; empty
    /// when the job has no instance yet
    async fn stream_logs(
        &self,
        job_id: &str,
        task_name: &str,
        follow: bool,
    ) -> Result<LogStream, OrchestratorError>;

    /// Resource usage of the most recent execution instance
    async fn usage_stats(&self, job_id: &str) -> Result<UsageStats, OrchestratorError>;
}
