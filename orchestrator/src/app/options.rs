//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::DEFAULT_PENDING_GRACE;
use crate::models::tenant::Tenant;
use crate::scheduler::NomadOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::reconciler;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Nomad connection
    pub scheduler: NomadOptions,

    /// Enable local HTTP server
    pub enable_socket_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Enable reconciler worker
    pub enable_reconciler: bool,

    /// Reconciler worker options
    pub reconciler: reconciler::Options,

    /// Age below which reconciliation ignores a pending deployment whose job
    /// the scheduler does not know
    pub pending_grace: Duration,

    /// Tenants registered at startup
    pub tenants: Vec<Tenant>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            scheduler: NomadOptions::default(),
            enable_socket_server: true,
            server: ServerOptions::default(),
            enable_reconciler: true,
            reconciler: reconciler::Options::default(),
            pending_grace: DEFAULT_PENDING_GRACE,
            tenants: Vec::new(),
        }
    }
}

impl AppOptions {
    /// Assemble runtime options from settings, with paths not set explicitly
    /// resolved against `layout`
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let jobs_path = settings
            .scheduler
            .jobs_path
            .clone()
            .unwrap_or_else(|| layout.jobs_dir().path().to_path_buf());
        let state_file = settings.store.persist.then(|| {
            settings
                .store
                .state_file
                .clone()
                .unwrap_or_else(|| layout.state_file().path().to_path_buf())
        });

        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions {
                layout,
                jobs_path,
                state_file,
            },
            scheduler: NomadOptions {
                address: settings.scheduler.address.clone(),
                namespace: settings.scheduler.namespace.clone(),
                region: settings.scheduler.region.clone(),
                token: settings.scheduler.token.clone(),
                request_timeout: Duration::from_secs(settings.scheduler.request_timeout_secs),
            },
            enable_socket_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            enable_reconciler: settings.reconciler.enabled,
            reconciler: reconciler::Options {
                interval: Duration::from_secs(settings.reconciler.interval_secs.max(1)),
                initial_delay: Duration::from_secs(settings.reconciler.initial_delay_secs),
            },
            pending_grace: Duration::from_secs(settings.reconciler.pending_grace_secs),
            tenants: settings.tenants.iter().map(Tenant::from).collect(),
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Job template directory
    pub jobs_path: std::path::PathBuf,

    /// Record store snapshot; `None` keeps records in memory only
    pub state_file: Option<std::path::PathBuf>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        let layout = StorageLayout::default();
        Self {
            jobs_path: layout.jobs_dir().path().to_path_buf(),
            state_file: Some(layout.state_file().path().to_path_buf()),
            layout,
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
