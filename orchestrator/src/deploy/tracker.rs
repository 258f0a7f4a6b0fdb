//! Deployment tracker

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::service::ServiceStatus;
use crate::store::{RecordStore, Transition};

const ACTIVE: [DeploymentStatus; 2] = [DeploymentStatus::Pending, DeploymentStatus::Running];
const ESTABLISHED: [DeploymentStatus; 2] = [DeploymentStatus::Running, DeploymentStatus::Completed];

/// Records deployments and answers which one currently matters for a service
#[derive(Clone)]
pub struct DeploymentTracker {
    store: Arc<dyn RecordStore>,
}

impl DeploymentTracker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Whether the service has a pending or running deployment
    pub async fn has_active_deployment(&self, service_id: Uuid) -> Result<bool, OrchestratorError> {
        Ok(self
            .store
            .latest_deployment(service_id, &ACTIVE)
            .await?
            .is_some())
    }

    /// Newest running or completed deployment
    pub async fn latest_active(
        &self,
        service_id: Uuid,
    ) -> Result<Option<Deployment>, OrchestratorError> {
        self.store.latest_deployment(service_id, &ESTABLISHED).await
    }

    /// Newest deployment in any status
    pub async fn latest(&self, service_id: Uuid) -> Result<Option<Deployment>, OrchestratorError> {
        self.store.latest_deployment(service_id, &[]).await
    }

    /// Insert a new pending deployment and move its service to
    /// `service_status`; fails with `DeploymentInProgress` when another
    /// pending or running deployment exists
    pub async fn claim(
        &self,
        deployment: Deployment,
        service_status: ServiceStatus,
    ) -> Result<Deployment, OrchestratorError> {
        let deployment = self
            .store
            .claim_deployment(deployment, service_status)
            .await?;
        debug!(
            service_id = %deployment.service_id,
            deployment_id = %deployment.id,
            job_id = %deployment.job_id,
            "Deployment recorded"
        );
        Ok(deployment)
    }

    /// Write a service status change together with its deployment update
    ///
    /// Returns `false` when another writer got there first.
    pub async fn settle(&self, transition: &Transition) -> Result<bool, OrchestratorError> {
        let applied = self.store.apply_transition(transition).await?;
        debug!(
            service_id = %transition.service_id,
            from = %transition.expected,
            to = %transition.status,
            deployment_status = ?transition.deployment.as_ref().map(|d| d.deployment.status),
            applied,
            "Settled transition"
        );
        Ok(applied)
    }

    /// All deployments of a service, newest first
    pub async fn history(&self, service_id: Uuid) -> Result<Vec<Deployment>, OrchestratorError> {
        self.store.list_deployments(service_id).await
    }
}
