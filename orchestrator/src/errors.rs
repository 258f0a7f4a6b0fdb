//! Error types for the orchestrator

use thiserror::Error;
use uuid::Uuid;

/// Error family, used by callers to decide between retrying, changing input
/// or escalating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Upstream,
    Persistence,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No job template file is configured")]
    TemplateFileEmpty,

    #[error("Job template not found: {0}")]
    TemplateNotFound(String),

    #[error("Service '{name}' of type '{service_type}' already exists for this tenant")]
    DuplicateService { name: String, service_type: String },

    #[error("Tenant has reached maximum number of services ({max_services})")]
    QuotaExceeded { max_services: u32 },

    #[error("Service {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("Service {0} deployment already in progress")]
    DeploymentInProgress(Uuid),

    #[error("Service {0} is not running")]
    NotRunning(Uuid),

    #[error("No active deployment found for service {0}")]
    NoActiveDeployment(Uuid),

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Tenant not found: {0}")]
    TenantNotFound(Uuid),

    #[error("Deployment not found: {0}")]
    DeploymentNotFound(Uuid),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("Scheduler rejected the job: {0}")]
    SchedulerRejected(String),

    #[error("Concurrent modification of job {0}")]
    ConcurrentModification(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        use OrchestratorError::*;

        match self {
            ValidationError(_) | TemplateFileEmpty => ErrorKind::Validation,
            DuplicateService { .. }
            | QuotaExceeded { .. }
            | AlreadyRunning(_)
            | DeploymentInProgress(_)
            | NotRunning(_)
            | NoActiveDeployment(_) => ErrorKind::Conflict,
            TemplateNotFound(_)
            | ServiceNotFound(_)
            | TenantNotFound(_)
            | DeploymentNotFound(_)
            | JobNotFound(_) => ErrorKind::NotFound,
            SchedulerUnavailable(_) | SchedulerRejected(_) | ConcurrentModification(_) => {
                ErrorKind::Upstream
            }
            PersistenceError(_) => ErrorKind::Persistence,
            NotImplemented(_) | IoError(_) | JsonError(_) | ConfigError(_) | ServerError(_)
            | ShutdownError(_) => ErrorKind::Internal,
        }
    }

    /// Stable code for the variant, independent of the message text
    pub fn code(&self) -> &'static str {
        use OrchestratorError::*;

        match self {
            ValidationError(_) => "validation_error",
            TemplateFileEmpty => "template_file_empty",
            TemplateNotFound(_) => "template_not_found",
            DuplicateService { .. } => "duplicate_service",
            QuotaExceeded { .. } => "quota_exceeded",
            AlreadyRunning(_) => "already_running",
            DeploymentInProgress(_) => "deployment_in_progress",
            NotRunning(_) => "not_running",
            NoActiveDeployment(_) => "no_active_deployment",
            ServiceNotFound(_) => "service_not_found",
            TenantNotFound(_) => "tenant_not_found",
            DeploymentNotFound(_) => "deployment_not_found",
            JobNotFound(_) => "job_not_found",
            SchedulerUnavailable(_) => "scheduler_unavailable",
            SchedulerRejected(_) => "scheduler_rejected",
            ConcurrentModification(_) => "concurrent_modification",
            PersistenceError(_) => "persistence_error",
            NotImplemented(_) => "not_implemented",
            IoError(_) => "io_error",
            JsonError(_) => "json_error",
            ConfigError(_) => "config_error",
            ServerError(_) => "server_error",
            ShutdownError(_) => "shutdown_error",
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrchestratorError::SchedulerUnavailable(_)
                | OrchestratorError::ConcurrentModification(_)
                | OrchestratorError::PersistenceError(_)
        )
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::SchedulerUnavailable(err.to_string())
    }
}
