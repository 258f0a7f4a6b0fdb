//! Settings file management

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logs::LogLevel;
use crate::models::tenant::Tenant;

/// Environment variables that take precedence over the settings file
pub const ENV_NOMAD_ADDR: &str = "NOMAD_ADDR";
pub const ENV_NOMAD_TOKEN: &str = "NOMAD_TOKEN";
pub const ENV_NOMAD_NAMESPACE: &str = "NOMAD_NAMESPACE";
pub const ENV_NOMAD_REGION: &str = "NOMAD_REGION";

/// Orchestrator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log: LogSettings,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Nomad connection and job templates
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub reconciler: ReconcilerSettings,

    #[serde(default)]
    pub store: StoreSettings,

    /// Tenants known at startup
    #[serde(default)]
    pub tenants: Vec<TenantSettings>,
}

impl Settings {
    /// Apply Nomad environment variables through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(address) = lookup(ENV_NOMAD_ADDR) {
            self.scheduler.address = address;
        }
        if let Some(token) = lookup(ENV_NOMAD_TOKEN) {
            self.scheduler.token = Some(SecretString::from(token));
        }
        if let Some(namespace) = lookup(ENV_NOMAD_NAMESPACE) {
            self.scheduler.namespace = Some(namespace);
        }
        if let Some(region) = lookup(ENV_NOMAD_REGION) {
            self.scheduler.region = Some(region);
        }
    }
}

fn default_true() -> bool {
    true
}

/// Log output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,

    /// Also write daily-rolling log files into this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_scheduler_address")]
    pub address: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// ACL token
    #[serde(default, skip_serializing)]
    pub token: Option<SecretString>,

    /// Job template directory, defaults to `<base_dir>/jobs`
    #[serde(default)]
    pub jobs_path: Option<PathBuf>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_scheduler_address() -> String {
    "http://127.0.0.1:4646".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            address: default_scheduler_address(),
            namespace: None,
            region: None,
            token: None,
            jobs_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Reconciliation worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// How long a pending deployment whose job the scheduler does not know
    /// yet is left alone
    #[serde(default = "default_pending_grace")]
    pub pending_grace_secs: u64,
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_initial_delay() -> u64 {
    5
}

fn default_pending_grace() -> u64 {
    60
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reconcile_interval(),
            initial_delay_secs: default_initial_delay(),
            pending_grace_secs: default_pending_grace(),
        }
    }
}

/// Record store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Persist a snapshot after every write
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Snapshot file, defaults to `<base_dir>/state/records.json`
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            persist: true,
            state_file: None,
        }
    }
}

/// Tenant seed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_max_services")]
    pub max_services: u32,
}

fn default_max_services() -> u32 {
    5
}

impl From<&TenantSettings> for Tenant {
    fn from(settings: &TenantSettings) -> Self {
        Tenant::new(settings.id, settings.name.clone(), settings.max_services)
    }
}
