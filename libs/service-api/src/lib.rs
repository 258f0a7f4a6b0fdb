//! Orchestrator API envelopes

use serde::{Deserialize, Serialize};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Header carrying the authenticated tenant id, absent for system callers
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error code
    pub error: String,
    pub message: String,
    /// Error family: validation, conflict, not_found, upstream, persistence, internal
    pub kind: String,
}

/// Generic list envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Service logs response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub lines: Vec<String>,
    pub total: usize,
}

/// Service control response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub service_id: String,
    pub message: Option<String>,
}

/// Reconciliation pass response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub examined: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}
