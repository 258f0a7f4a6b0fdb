//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::ServiceOrchestrator;
use crate::errors::OrchestratorError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::scheduler::{NomadClient, SchedulerClient};
use crate::store::{MemoryStore, RecordStore};
use crate::templates::{JobTemplateRenderer, TemplateCatalog};

/// Main application state
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub scheduler: Arc<dyn SchedulerClient>,
    pub orchestrator: Arc<ServiceOrchestrator>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, OrchestratorError> {
        info!("Initializing application state...");

        let store: Arc<dyn RecordStore> = match &options.storage.state_file {
            Some(path) => Arc::new(MemoryStore::open(File::new(path)).await?),
            None => Arc::new(MemoryStore::new()),
        };

        for tenant in &options.tenants {
            info!(
                tenant_id = %tenant.id,
                max_services = tenant.max_services,
                "Registering tenant"
            );
            store.put_tenant(tenant.clone()).await?;
        }

        let scheduler: Arc<dyn SchedulerClient> =
            Arc::new(NomadClient::new(options.scheduler.clone())?);

        Ok(Self::with_components(
            store,
            scheduler,
            Dir::new(&options.storage.jobs_path),
            options.pending_grace,
        ))
    }

    /// Assemble state from already-built components
    pub fn with_components(
        store: Arc<dyn RecordStore>,
        scheduler: Arc<dyn SchedulerClient>,
        jobs_dir: Dir,
        pending_grace: Duration,
    ) -> Self {
        let orchestrator = Arc::new(
            ServiceOrchestrator::new(
                store.clone(),
                scheduler.clone(),
                JobTemplateRenderer::new(jobs_dir.clone()),
                TemplateCatalog::new(jobs_dir),
            )
            .with_pending_grace(pending_grace),
        );

        Self {
            store,
            scheduler,
            orchestrator,
        }
    }

    /// Shutdown application state, writing out the record store
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        info!("Shutting down application state...");
        self.store.flush().await
    }
}
