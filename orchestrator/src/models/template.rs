//! Service template models

use serde::{Deserialize, Serialize};

use crate::models::service::ServiceType;

/// A job template file offered as a starting point for new services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub description: String,
    pub job_file: String,
}
