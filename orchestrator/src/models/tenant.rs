//! Tenant models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_max_services() -> u32 {
    5
}

/// Tenant as seen by the orchestrator: identity and service quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    /// Maximum number of declared services
    #[serde(default = "default_max_services")]
    pub max_services: u32,
}

impl Tenant {
    pub fn new(id: Uuid, name: impl Into<String>, max_services: u32) -> Self {
        Self {
            id,
            name: name.into(),
            max_services,
        }
    }
}
