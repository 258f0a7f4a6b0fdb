//! Service orchestrator
//!
//! Validates preconditions, drives the service lifecycle and coordinates the
//! renderer, scheduler and deployment tracker. Holds no in-process locks;
//! races between requests are settled by atomic store operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deploy::fsm::{ServiceEvent, ServiceFsm};
use crate::deploy::tracker::DeploymentTracker;
use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::service::{CreateServiceRequest, Service, ServiceStatus};
use crate::models::template::ServiceTemplate;
use crate::scheduler::{SchedulerClient, SubmitAck, UsageStats};
use crate::store::{RecordStore, Transition};
use crate::templates::{JobTemplateRenderer, TemplateCatalog};

/// Usage report for a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceMetrics {
    /// The service has never been deployed, or no deployment got established
    NoActiveDeployment { service_id: Uuid },
    Reported {
        service_id: Uuid,
        job_id: String,
        usage: UsageStats,
    },
}

/// How long reconciliation leaves a pending deployment alone while its job is
/// not yet known to the scheduler
pub const DEFAULT_PENDING_GRACE: Duration = Duration::from_secs(60);

pub struct ServiceOrchestrator {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) scheduler: Arc<dyn SchedulerClient>,
    pub(crate) tracker: DeploymentTracker,
    pub(crate) pending_grace: Duration,
    renderer: JobTemplateRenderer,
    catalog: TemplateCatalog,
}

impl ServiceOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        scheduler: Arc<dyn SchedulerClient>,
        renderer: JobTemplateRenderer,
        catalog: TemplateCatalog,
    ) -> Self {
        Self {
            tracker: DeploymentTracker::new(store.clone()),
            store,
            scheduler,
            pending_grace: DEFAULT_PENDING_GRACE,
            renderer,
            catalog,
        }
    }

    pub fn with_pending_grace(mut self, pending_grace: Duration) -> Self {
        self.pending_grace = pending_grace;
        self
    }

    /// Declare a new service in status `stopped`
    ///
    /// Services without a tenant are exempt from quota.
    pub async fn create(
        &self,
        request: CreateServiceRequest,
        user_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<Service, OrchestratorError> {
        request.validate()?;

        let max_services = match tenant_id {
            Some(tenant_id) => {
                let tenant = self
                    .store
                    .get_tenant(tenant_id)
                    .await?
                    .ok_or(OrchestratorError::TenantNotFound(tenant_id))?;
                Some(tenant.max_services)
            }
            None => None,
        };

        let service = self
            .store
            .insert_service(Service::new(request, user_id, tenant_id), max_services)
            .await?;

        info!(
            service_id = %service.id,
            name = %service.name,
            service_type = %service.service_type,
            tenant_id = ?service.tenant_id,
            user_id = %user_id,
            "Service created"
        );
        Ok(service)
    }

    /// Render and submit a new job for the service
    ///
    /// The pending deployment is claimed, and the service moved to pending,
    /// before anything reaches the scheduler. A rejected submission marks the
    /// deployment failed and puts the service back where it was.
    pub async fn start(&self, service_id: Uuid, user_id: Uuid) -> Result<Deployment, OrchestratorError> {
        let service = self.service(service_id, None).await?;

        let mut fsm = ServiceFsm::new(service.id, service.status);
        fsm.process(ServiceEvent::Start)?;

        if self.tracker.has_active_deployment(service.id).await? {
            return Err(OrchestratorError::DeploymentInProgress(service.id));
        }

        let job_id = service.job_id_at(Utc::now().timestamp());
        let job_document = self
            .renderer
            .render(&service.config.job_file, &service, &job_id)
            .await?;

        let deployment = self
            .tracker
            .claim(Deployment::pending(service.id, job_id.clone(), user_id), fsm.state())
            .await?;

        if let Err(e) = self.scheduler.submit(&job_document, &job_id).await {
            error!(
                service_id = %service.id,
                deployment_id = %deployment.id,
                job_id = %job_id,
                "Job submission failed: {}",
                e
            );
            let mut failed = deployment.clone();
            failed.advance(DeploymentStatus::Failed, Some(e.to_string()));
            let rollback = Transition::service(service.id, fsm.state(), service.status)
                .with_deployment(DeploymentStatus::Pending, failed);
            match self.tracker.settle(&rollback).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    deployment_id = %deployment.id,
                    "Deployment changed while its submission failed"
                ),
                Err(settle_err) => error!(
                    deployment_id = %deployment.id,
                    "Failed to record failed deployment, leaving it to reconciliation: {}",
                    settle_err
                ),
            }
            return Err(e);
        }

        info!(
            service_id = %service.id,
            deployment_id = %deployment.id,
            job_id = %job_id,
            user_id = %user_id,
            "Service started"
        );
        Ok(deployment)
    }

    /// Cancel the running job and mark the service stopped
    ///
    /// The service status and the deployment completion are written together.
    pub async fn stop(&self, service_id: Uuid, user_id: Uuid) -> Result<Service, OrchestratorError> {
        let service = self.service(service_id, None).await?;

        let mut fsm = ServiceFsm::new(service.id, service.status);
        fsm.process(ServiceEvent::Stop)?;

        let deployment = self
            .tracker
            .latest_active(service.id)
            .await?
            .ok_or(OrchestratorError::NoActiveDeployment(service.id))?;

        self.scheduler.cancel(&deployment.job_id).await?;

        let mut transition = Transition::service(service.id, service.status, fsm.state());
        if deployment.status != DeploymentStatus::Completed {
            let mut completed = deployment.clone();
            completed.advance(DeploymentStatus::Completed, None);
            transition = transition.with_deployment(deployment.status, completed);
        }

        if !self.tracker.settle(&transition).await? {
            // Someone else moved the service after the job was cancelled
            let current = self.service(service.id, None).await?;
            if current.status != ServiceStatus::Stopped {
                return Err(OrchestratorError::ConcurrentModification(deployment.job_id));
            }
            info!(
                service_id = %service.id,
                job_id = %deployment.job_id,
                "Service was already stopped"
            );
            return Ok(current);
        }

        info!(
            service_id = %service.id,
            job_id = %deployment.job_id,
            user_id = %user_id,
            "Service stopped"
        );
        self.service(service.id, None).await
    }

    /// Re-register the running job; service status is left as it is
    pub async fn restart(
        &self,
        service_id: Uuid,
        user_id: Uuid,
    ) -> Result<SubmitAck, OrchestratorError> {
        let service = self.service(service_id, None).await?;

        let mut fsm = ServiceFsm::new(service.id, service.status);
        fsm.process(ServiceEvent::Restart)?;

        let deployment = self
            .tracker
            .latest_active(service.id)
            .await?
            .ok_or(OrchestratorError::NoActiveDeployment(service.id))?;

        let ack = self.scheduler.restart(&deployment.job_id).await?;

        info!(
            service_id = %service.id,
            job_id = %deployment.job_id,
            eval_id = %ack.eval_id,
            user_id = %user_id,
            "Service restarted"
        );
        Ok(ack)
    }

    pub async fn get(
        &self,
        service_id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Service, OrchestratorError> {
        self.service(service_id, tenant_filter).await
    }

    /// Services visible under `tenant_filter`, newest first
    pub async fn list(&self, tenant_filter: Option<Uuid>) -> Result<Vec<Service>, OrchestratorError> {
        self.store.list_services(tenant_filter).await
    }

    /// Deployment history, newest first
    pub async fn deployments(
        &self,
        service_id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Vec<Deployment>, OrchestratorError> {
        let service = self.service(service_id, tenant_filter).await?;
        self.tracker.history(service.id).await
    }

    /// Log lines of the latest established deployment; empty when there is none
    pub async fn service_logs(
        &self,
        service_id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Vec<String>, OrchestratorError> {
        let service = self.service(service_id, tenant_filter).await?;

        let Some(deployment) = self.tracker.latest_active(service.id).await? else {
            return Ok(Vec::new());
        };

        self.scheduler
            .stream_logs(&deployment.job_id, &service.name, false)
            .await?
            .try_collect()
            .await
    }

    /// Resource usage of the latest established deployment
    pub async fn service_metrics(
        &self,
        service_id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<ServiceMetrics, OrchestratorError> {
        let service = self.service(service_id, tenant_filter).await?;

        let Some(deployment) = self.tracker.latest_active(service.id).await? else {
            warn!(service_id = %service.id, "No active deployment for metrics");
            return Ok(ServiceMetrics::NoActiveDeployment {
                service_id: service.id,
            });
        };

        let usage = self.scheduler.usage_stats(&deployment.job_id).await?;
        Ok(ServiceMetrics::Reported {
            service_id: service.id,
            job_id: deployment.job_id,
            usage,
        })
    }

    /// Job templates available for new services
    pub async fn templates(&self) -> Result<Vec<ServiceTemplate>, OrchestratorError> {
        self.catalog.list().await
    }

    async fn service(
        &self,
        service_id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Service, OrchestratorError> {
        self.store
            .get_service(service_id, tenant_filter)
            .await?
            .ok_or(OrchestratorError::ServiceNotFound(service_id))
    }
}
