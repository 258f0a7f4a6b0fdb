//! Nomad API models
//!
//! Only the fields the orchestrator reads are typed. Jobs keep every other
//! field in `extra` so a fetched job can be registered again unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header carrying the ACL token
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Job status reported while allocations are placed
pub const JOB_STATUS_PENDING: &str = "pending";

/// Job status reported while at least one allocation runs
pub const JOB_STATUS_RUNNING: &str = "running";

/// Job status reported once the job is stopped or finished
pub const JOB_STATUS_DEAD: &str = "dead";

/// A Nomad job specification as returned by `GET /v1/job/:id` or
/// `POST /v1/jobs/parse`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(
        rename = "JobModifyIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub job_modify_index: Option<u64>,

    /// Remaining job fields, passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /v1/jobs/parse`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParseRequest {
    #[serde(rename = "JobHCL")]
    pub job_hcl: String,

    #[serde(rename = "Canonicalize")]
    pub canonicalize: bool,
}

/// Body of `POST /v1/jobs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRegisterRequest {
    #[serde(rename = "Job")]
    pub job: Job,

    #[serde(rename = "EnforceIndex", default)]
    pub enforce_index: bool,

    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,
}

/// Response of `POST /v1/jobs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,

    #[serde(rename = "Warnings", default)]
    pub warnings: String,
}

/// Response of `DELETE /v1/job/:id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDeregisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
}

/// Element of `GET /v1/job/:id/allocations`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationListStub {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "NodeID", default)]
    pub node_id: String,

    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,

    #[serde(rename = "TaskGroup", default)]
    pub task_group: String,

    #[serde(rename = "CreateIndex", default)]
    pub create_index: u64,

    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
}

/// Response of `GET /v1/client/allocation/:id/stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocResourceUsage {
    #[serde(rename = "ResourceUsage", default)]
    pub resource_usage: ResourceUsage,

    #[serde(rename = "Timestamp", default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(rename = "MemoryStats", default)]
    pub memory_stats: MemoryStats,

    #[serde(rename = "CpuStats", default)]
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(rename = "RSS", default)]
    pub rss: u64,

    #[serde(rename = "Usage", default)]
    pub usage: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(rename = "TotalTicks", default)]
    pub total_ticks: f64,

    #[serde(rename = "Percent", default)]
    pub percent: f64,
}
