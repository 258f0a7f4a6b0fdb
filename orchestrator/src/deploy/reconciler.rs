//! Reconciliation of recorded state with the scheduler

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::deploy::fsm::{Observation, ServiceEvent, ServiceFsm};
use crate::deploy::orchestrator::ServiceOrchestrator;
use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::service::Service;
use crate::scheduler::JobState;
use crate::store::Transition;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Services that were looked at: pending or running ones, and any other
    /// with a pending or running deployment
    pub examined: u64,

    /// Services whose service or deployment record changed
    pub updated: u64,

    /// Services already in line with the scheduler
    pub unchanged: u64,

    /// Services without any deployment, or changed by another request while
    /// the pass was looking at them
    pub skipped: u64,

    /// One entry per service that could not be reconciled
    pub errors: Vec<String>,

    pub duration_ms: u64,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ReconcileReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum Outcome {
    Updated,
    Unchanged,
    Skipped,
}

impl ServiceOrchestrator {
    /// Bring every pending or running service, and every service with an
    /// active deployment, in line with its job's status on the scheduler
    ///
    /// Failures are isolated per service. Running the pass again without
    /// scheduler changes writes nothing. Writes are conditional on the records
    /// still holding what the pass read, so a concurrent stop or start wins.
    pub async fn reconcile(&self) -> Result<ReconcileReport, OrchestratorError> {
        let started = Instant::now();
        let mut report = ReconcileReport::default();

        let services = self.store.list_services_to_reconcile().await?;

        for service in services {
            report.examined += 1;
            match self.reconcile_service(&service).await {
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(service_id = %service.id, "Failed to reconcile service: {}", e);
                    report.errors.push(format!("{}: {}", service.id, e));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report.finished_at = Some(Utc::now());

        info!(
            examined = report.examined,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    async fn reconcile_service(&self, service: &Service) -> Result<Outcome, OrchestratorError> {
        let Some(deployment) = self.tracker.latest(service.id).await? else {
            debug!(service_id = %service.id, "No deployment to reconcile");
            return Ok(Outcome::Skipped);
        };

        let state = self.scheduler.status_of(&deployment.job_id).await?;
        if state == JobState::NotFound && self.within_grace(&deployment) {
            debug!(
                service_id = %service.id,
                job_id = %deployment.job_id,
                "Job not registered yet"
            );
            return Ok(Outcome::Unchanged);
        }
        let observation = Observation::of(&deployment.job_id, &state);

        let mut fsm = ServiceFsm::new(service.id, service.status);
        fsm.process(ServiceEvent::Observed(observation.service_status))?;
        let mut transition = Transition::service(service.id, service.status, fsm.state());

        // Only pending or running deployments follow the scheduler
        if deployment.status.is_active() && deployment.status != observation.deployment_status {
            let mut observed = deployment.clone();
            observed.advance(observation.deployment_status, observation.error_msg);
            transition = transition.with_deployment(deployment.status, observed);
        }

        if transition.is_noop() {
            return Ok(Outcome::Unchanged);
        }

        if !self.tracker.settle(&transition).await? {
            debug!(
                service_id = %service.id,
                job_id = %deployment.job_id,
                "Service changed during reconciliation"
            );
            return Ok(Outcome::Skipped);
        }

        info!(
            service_id = %service.id,
            job_id = %deployment.job_id,
            from = %service.status,
            to = %fsm.state(),
            deployment_status = %transition
                .deployment
                .as_ref()
                .map_or(deployment.status, |d| d.deployment.status),
            "Service reconciled"
        );
        Ok(Outcome::Updated)
    }

    fn within_grace(&self, deployment: &Deployment) -> bool {
        if deployment.status != DeploymentStatus::Pending {
            return false;
        }
        let age = (Utc::now() - deployment.created_at)
            .to_std()
            .unwrap_or_default();
        age < self.pending_grace
    }
}
