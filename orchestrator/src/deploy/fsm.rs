//! Service lifecycle state machine
//!
//! `stopped -> pending -> running -> stopped`, `running -> running` on
//! restart, and any state to whatever the scheduler reports during
//! reconciliation. There is no terminal state.

use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::DeploymentStatus;
use crate::models::service::ServiceStatus;
use crate::scheduler::{JobState, SchedulerJobStatus};

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A job submission was accepted for this service
    Start,

    /// The running job is being cancelled
    Stop,

    /// The running job is being re-registered
    Restart,

    /// Reconciliation observed the service's job on the scheduler
    Observed(ServiceStatus),
}

/// Service FSM
#[derive(Debug, Clone)]
pub struct ServiceFsm {
    service_id: Uuid,
    state: ServiceStatus,
}

impl ServiceFsm {
    pub fn new(service_id: Uuid, state: ServiceStatus) -> Self {
        Self { service_id, state }
    }

    pub fn state(&self) -> ServiceStatus {
        self.state
    }

    /// Process an event and transition state. Rejected transitions carry the
    /// precondition that failed.
    pub fn process(&mut self, event: ServiceEvent) -> Result<(), OrchestratorError> {
        let new_state = match (self.state, &event) {
            (ServiceStatus::Running, ServiceEvent::Start) => {
                return Err(OrchestratorError::AlreadyRunning(self.service_id));
            }
            (_, ServiceEvent::Start) => ServiceStatus::Pending,

            (ServiceStatus::Running, ServiceEvent::Stop) => ServiceStatus::Stopped,
            (ServiceStatus::Running, ServiceEvent::Restart) => ServiceStatus::Running,
            (_, ServiceEvent::Stop | ServiceEvent::Restart) => {
                return Err(OrchestratorError::NotRunning(self.service_id));
            }

            (_, ServiceEvent::Observed(status)) => *status,
        };

        self.state = new_state;
        Ok(())
    }
}

/// Service status implied by a scheduler job status
pub fn service_status_for(status: &SchedulerJobStatus) -> ServiceStatus {
    match status {
        SchedulerJobStatus::Running => ServiceStatus::Running,
        SchedulerJobStatus::Dead => ServiceStatus::Stopped,
        SchedulerJobStatus::Pending => ServiceStatus::Pending,
        SchedulerJobStatus::Unknown(_) => ServiceStatus::Error,
    }
}

/// Deployment status implied by a scheduler job status
pub fn deployment_status_for(status: &SchedulerJobStatus) -> DeploymentStatus {
    match status {
        SchedulerJobStatus::Running => DeploymentStatus::Running,
        SchedulerJobStatus::Dead => DeploymentStatus::Completed,
        SchedulerJobStatus::Pending => DeploymentStatus::Pending,
        SchedulerJobStatus::Unknown(_) => DeploymentStatus::Failed,
    }
}

/// What reconciliation should record for an observed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub service_status: ServiceStatus,
    pub deployment_status: DeploymentStatus,
    pub error_msg: Option<String>,
}

impl Observation {
    pub fn of(job_id: &str, state: &JobState) -> Self {
        match state {
            JobState::Found(snapshot) => Self {
                service_status: service_status_for(&snapshot.status),
                deployment_status: deployment_status_for(&snapshot.status),
                error_msg: match &snapshot.status {
                    SchedulerJobStatus::Unknown(status) => {
                        Some(format!("Job {} reported unexpected status '{}'", job_id, status))
                    }
                    _ => None,
                },
            },
            JobState::NotFound => Self {
                service_status: ServiceStatus::Error,
                deployment_status: DeploymentStatus::Failed,
                error_msg: Some(format!("Job {} not found on the scheduler", job_id)),
            },
        }
    }
}
