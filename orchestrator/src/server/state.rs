//! Server state

use std::sync::Arc;

use crate::deploy::ServiceOrchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<ServiceOrchestrator>,
}

impl ServerState {
    pub fn new(orchestrator: Arc<ServiceOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
