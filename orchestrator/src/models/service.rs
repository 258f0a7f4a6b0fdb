//! Service models

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::OrchestratorError;

/// Maximum service name length; the name ends up inside a Nomad job id
pub const MAX_SERVICE_NAME_LEN: usize = 63;

/// Kind of workload a service represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Database,
    WebServer,
    MessageQueue,
    Monitoring,
    Devops,
    Custom,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Database => "database",
            ServiceType::WebServer => "web_server",
            ServiceType::MessageQueue => "message_queue",
            ServiceType::Monitoring => "monitoring",
            ServiceType::Devops => "devops",
            ServiceType::Custom => "custom",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator view of a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Pending,
    Running,
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Pending => "pending",
            ServiceStatus::Running => "running",
            ServiceStatus::Error => "error",
        }
    }

    /// Statuses the reconciliation pass looks at
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ServiceStatus::Pending | ServiceStatus::Running)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource request (cpu in MHz, memory and disk in MB)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub cpu: u32,

    #[serde(default)]
    pub memory: u32,

    #[serde(default)]
    pub disk: u32,
}

/// Health check declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub interval: String,

    #[serde(default)]
    pub timeout: String,

    #[serde(default)]
    pub retries: u32,
}

/// Declarative service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub ports: Vec<u16>,

    #[serde(default)]
    pub environment: HashMap<String, String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub resources: ResourceConfig,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Job template file name, relative to the jobs directory
    #[serde(default)]
    pub job_file: String,

    #[serde(default)]
    pub custom_variables: HashMap<String, String>,
}

/// A tenant-owned deployable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub status: ServiceStatus,
    #[serde(default)]
    pub description: String,
    pub config: ServiceConfig,
    /// None for system-wide services
    pub tenant_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// Create a new stopped service from a validated request
    pub fn new(request: CreateServiceRequest, created_by: Uuid, tenant_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            service_type: request.service_type,
            status: ServiceStatus::Stopped,
            description: request.description,
            config: request.config,
            tenant_id,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this service collides with (name, type, tenant)
    pub fn same_identity(&self, name: &str, service_type: ServiceType, tenant_id: Option<Uuid>) -> bool {
        self.name == name && self.service_type == service_type && self.tenant_id == tenant_id
    }

    /// Prefix used in job ids: first 8 characters of the tenant id, or `default`
    pub fn tenant_prefix(&self) -> String {
        match self.tenant_id {
            Some(tenant_id) => tenant_id.to_string()[..8].to_string(),
            None => "default".to_string(),
        }
    }

    /// Job id for a submission at `unix_timestamp`
    pub fn job_id_at(&self, unix_timestamp: i64) -> String {
        format!("{}-{}-{}", self.tenant_prefix(), self.name, unix_timestamp)
    }
}

/// Service creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    #[serde(default)]
    pub description: String,
    pub config: ServiceConfig,
}

impl CreateServiceRequest {
    /// Check the request shape before any lookup
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.is_empty() {
            return Err(OrchestratorError::ValidationError(
                "service name is required".to_string(),
            ));
        }

        if self.name.len() > MAX_SERVICE_NAME_LEN {
            return Err(OrchestratorError::ValidationError(format!(
                "service name must be at most {} characters",
                MAX_SERVICE_NAME_LEN
            )));
        }

        let valid_chars = self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || self.name.starts_with('-') || self.name.ends_with('-') {
            return Err(OrchestratorError::ValidationError(format!(
                "service name '{}' must contain only lowercase letters, digits and inner dashes",
                self.name
            )));
        }

        if self.config.job_file.trim().is_empty() {
            return Err(OrchestratorError::ValidationError(
                "config.job_file is required".to_string(),
            ));
        }

        Ok(())
    }
}
