//! In-memory record store with an optional JSON snapshot file

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::filesys::file::File;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::service::{Service, ServiceStatus};
use crate::models::tenant::Tenant;
use crate::store::{RecordStore, Transition};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Records {
    #[serde(default)]
    services: HashMap<Uuid, Service>,
    #[serde(default)]
    deployments: HashMap<Uuid, Deployment>,
    #[serde(default)]
    tenants: HashMap<Uuid, Tenant>,
    #[serde(default)]
    next_sequence: u64,
    #[serde(default)]
    revision: u64,
}

impl Records {
    fn visible(service: &Service, tenant_filter: Option<Uuid>) -> bool {
        match tenant_filter {
            Some(tenant_id) => service.tenant_id == Some(tenant_id),
            None => true,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn set_service_status(&mut self, id: Uuid, status: ServiceStatus) {
        if let Some(service) = self.services.get_mut(&id) {
            if service.status != status {
                service.status = status;
                service.updated_at = chrono::Utc::now();
            }
        }
    }

    fn deployments_of(&self, service_id: Uuid) -> impl Iterator<Item = &Deployment> {
        self.deployments
            .values()
            .filter(move |d| d.service_id == service_id)
    }
}

/// Record store kept in memory
///
/// With a snapshot file every write is persisted before it becomes visible; a
/// failed snapshot write leaves the store unchanged.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    snapshot: Option<File>,
}

impl MemoryStore {
    /// Create an empty store that is never persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `snapshot`, loading it when it exists
    pub async fn open(snapshot: File) -> Result<Self, OrchestratorError> {
        let records = if snapshot.exists().await {
            let records: Records = snapshot.read_json().await.map_err(|e| {
                OrchestratorError::PersistenceError(format!(
                    "Failed to load state from {}: {}",
                    snapshot.path().display(),
                    e
                ))
            })?;
            info!(
                path = %snapshot.path().display(),
                services = records.services.len(),
                deployments = records.deployments.len(),
                "Loaded state snapshot"
            );
            records
        } else {
            Records::default()
        };

        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(snapshot),
        })
    }

    /// Apply `change` to a copy of the records, persist it, then publish it
    ///
    /// A change that does not bump the revision is not written.
    async fn commit<T, F>(&self, change: F) -> Result<T, OrchestratorError>
    where
        F: FnOnce(&mut Records) -> Result<T, OrchestratorError> + Send,
        T: Send,
    {
        let mut records = self.records.write().await;

        let Some(snapshot) = &self.snapshot else {
            return change(&mut *records);
        };

        let mut next = records.clone();
        let result = change(&mut next)?;
        if next.revision == records.revision {
            return Ok(result);
        }

        persist(snapshot, &next).await?;
        *records = next;
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_service(
        &self,
        service: Service,
        max_services: Option<u32>,
    ) -> Result<Service, OrchestratorError> {
        self.commit(move |records| {
            let duplicate = records.services.values().any(|existing| {
                existing.same_identity(&service.name, service.service_type, service.tenant_id)
            });
            if duplicate {
                return Err(OrchestratorError::DuplicateService {
                    name: service.name.clone(),
                    service_type: service.service_type.to_string(),
                });
            }

            if let Some(max_services) = max_services {
                let owned = records
                    .services
                    .values()
                    .filter(|s| s.tenant_id == service.tenant_id)
                    .count();
                if owned >= max_services as usize {
                    return Err(OrchestratorError::QuotaExceeded { max_services });
                }
            }

            debug!(service_id = %service.id, name = %service.name, "Inserting service");
            records.services.insert(service.id, service.clone());
            records.touch();
            Ok(service)
        })
        .await
    }

    async fn get_service(
        &self,
        id: Uuid,
        tenant_filter: Option<Uuid>,
    ) -> Result<Option<Service>, OrchestratorError> {
        let records = self.records.read().await;
        Ok(records
            .services
            .get(&id)
            .filter(|s| Records::visible(s, tenant_filter))
            .cloned())
    }

    async fn list_services(
        &self,
        tenant_filter: Option<Uuid>,
    ) -> Result<Vec<Service>, OrchestratorError> {
        let records = self.records.read().await;
        let mut services: Vec<Service> = records
            .services
            .values()
            .filter(|s| Records::visible(s, tenant_filter))
            .cloned()
            .collect();

        services.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(services)
    }

    async fn list_services_to_reconcile(&self) -> Result<Vec<Service>, OrchestratorError> {
        let records = self.records.read().await;
        let mut services: Vec<Service> = records
            .services
            .values()
            .filter(|s| {
                s.status.is_in_flight()
                    || records.deployments_of(s.id).any(|d| d.status.is_active())
            })
            .cloned()
            .collect();

        services.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(services)
    }

    async fn count_services(&self, tenant_id: Option<Uuid>) -> Result<usize, OrchestratorError> {
        let records = self.records.read().await;
        Ok(records
            .services
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .count())
    }

    async fn claim_deployment(
        &self,
        mut deployment: Deployment,
        service_status: ServiceStatus,
    ) -> Result<Deployment, OrchestratorError> {
        self.commit(move |records| {
            let service_id = deployment.service_id;
            if !records.services.contains_key(&service_id) {
                return Err(OrchestratorError::ServiceNotFound(service_id));
            }
            if records
                .deployments_of(service_id)
                .any(|d| d.status.is_active())
            {
                return Err(OrchestratorError::DeploymentInProgress(service_id));
            }

            records.next_sequence += 1;
            deployment.sequence = records.next_sequence;
            records.deployments.insert(deployment.id, deployment.clone());
            records.set_service_status(service_id, service_status);
            records.touch();
            Ok(deployment)
        })
        .await
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<bool, OrchestratorError> {
        let transition = transition.clone();
        self.commit(move |records| {
            let service = records
                .services
                .get(&transition.service_id)
                .ok_or(OrchestratorError::ServiceNotFound(transition.service_id))?;
            if service.status != transition.expected {
                return Ok(false);
            }

            if let Some(change) = &transition.deployment {
                let id = change.deployment.id;
                let stored = records
                    .deployments
                    .get(&id)
                    .filter(|d| d.service_id == transition.service_id)
                    .ok_or(OrchestratorError::DeploymentNotFound(id))?;
                if stored.status != change.expected {
                    return Ok(false);
                }
            }

            if transition.is_noop() {
                return Ok(true);
            }

            records.set_service_status(transition.service_id, transition.status);
            if let Some(change) = transition.deployment {
                records.deployments.insert(change.deployment.id, change.deployment);
            }
            records.touch();
            Ok(true)
        })
        .await
    }

    async fn list_deployments(
        &self,
        service_id: Uuid,
    ) -> Result<Vec<Deployment>, OrchestratorError> {
        let records = self.records.read().await;
        let mut deployments: Vec<Deployment> = records.deployments_of(service_id).cloned().collect();
        deployments.sort_by_key(|d| std::cmp::Reverse(d.order_key()));
        Ok(deployments)
    }

    async fn latest_deployment(
        &self,
        service_id: Uuid,
        statuses: &[DeploymentStatus],
    ) -> Result<Option<Deployment>, OrchestratorError> {
        let records = self.records.read().await;
        Ok(records
            .deployments_of(service_id)
            .filter(|d| statuses.is_empty() || statuses.contains(&d.status))
            .max_by_key(|d| d.order_key())
            .cloned())
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>, OrchestratorError> {
        let records = self.records.read().await;
        Ok(records.tenants.get(&id).cloned())
    }

    async fn put_tenant(&self, tenant: Tenant) -> Result<(), OrchestratorError> {
        self.commit(move |records| {
            records.tenants.insert(tenant.id, tenant);
            records.touch();
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), OrchestratorError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let records = self.records.read().await;
        persist(snapshot, &records).await?;
        info!(
            path = %snapshot.path().display(),
            services = records.services.len(),
            deployments = records.deployments.len(),
            "Flushed state snapshot"
        );
        Ok(())
    }
}

async fn persist(snapshot: &File, records: &Records) -> Result<(), OrchestratorError> {
    snapshot.write_json(records).await.map_err(|e| {
        error!(path = %snapshot.path().display(), "Failed to write state snapshot: {}", e);
        OrchestratorError::PersistenceError(format!("Failed to write state snapshot: {}", e))
    })
}
