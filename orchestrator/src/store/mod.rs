//! Record store for services, deployments and tenants
//!
//! Check-then-insert sequences that guard invariants (service uniqueness,
//! tenant quota, one active deployment per service) are single store
//! operations, so concurrent requests cannot interleave between the check
//! and the write. Status changes are compare-and-set: a [`Transition`] names
//! the status each record must still have and writes the service and its
//! deployment together or not at all.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::service::{Service, ServiceStatus};
use crate::models::tenant::Tenant;

/// Persistence backend for orchestrator records
///
/// `tenant_filter` arguments restrict results to one tenant's services; `None`
/// means no restriction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a service unless one with the same (name, type, tenant) exists
    /// or the tenant already holds `max_services` services.
    async fn insert_service(
        &self,
        service: Service,
        max_services: Option<u32>,
    ) -> Result<Service, OrchestratorError>;

    async fn get_service(
        &self,
        id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Option<Service>, OrchestratorError>;

    /// Services, newest first
    async fn list_services(
        &self,
        tenant_filter: Option<Uuid>,
    ) -> Result<Vec<Service>, OrchestratorError>;

    /// Services that are pending or running, or that have a pending or
    /// running deployment whatever their own status, oldest first
    async fn list_services_to_reconcile(&self) -> Result<Vec<Service>, OrchestratorError>;

    /// Number of services owned by exactly `tenant_id`
    async fn count_services(&self, tenant_id: Option<Uuid>) -> Result<usize, OrchestratorError>;

    /// Insert a deployment unless its service already has a pending or running
    /// one, and move the service to `service_status` in the same write.
    /// Assigns the insertion sequence.
    async fn claim_deployment(
        &self,
        deployment: Deployment,
        service_status: ServiceStatus,
    ) -> Result<Deployment, OrchestratorError>;

    /// Apply `transition` if every record it names still has its expected
    /// status. Returns `false`, writing nothing, when one does not.
    async fn apply_transition(&self, transition: &Transition) -> Result<bool, OrchestratorError>;

    /// Deployments of a service, newest first
    async fn list_deployments(&self, service_id: Uuid)
        -> Result<Vec<Deployment>, OrchestratorError>;

    /// Newest deployment of a service whose status is one of `statuses`; an
    /// empty slice matches any status.
    async fn latest_deployment(
        &self,
        service_id: Uuid,
        statuses: &[DeploymentStatus],
    ) -> Result<Option<Deployment>, OrchestratorError>;

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>, OrchestratorError>;

    async fn put_tenant(&self, tenant: Tenant) -> Result<(), OrchestratorError>;

    /// Persist everything written so far
    async fn flush(&self) -> Result<(), OrchestratorError>;
}

/// Compare-and-set status change of a service and, optionally, one of its
/// deployments
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub service_id: Uuid,
    /// Status the stored service must have for the change to apply
    pub expected: ServiceStatus,
    pub status: ServiceStatus,
    pub deployment: Option<DeploymentTransition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentTransition {
    /// Status the stored deployment must have for the change to apply
    pub expected: DeploymentStatus,
    /// Replacement record
    pub deployment: Deployment,
}

impl Transition {
    pub fn service(service_id: Uuid, expected: ServiceStatus, status: ServiceStatus) -> Self {
        Self {
            service_id,
            expected,
            status,
            deployment: None,
        }
    }

    /// Also replace the stored deployment, which must still be in `expected`
    pub fn with_deployment(mut self, expected: DeploymentStatus, deployment: Deployment) -> Self {
        self.deployment = Some(DeploymentTransition {
            expected,
            deployment,
        });
        self
    }

    /// Whether applying the transition would change anything
    pub fn is_noop(&self) -> bool {
        self.expected == self.status && self.deployment.is_none()
    }
}
