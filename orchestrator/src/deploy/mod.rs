//! Service deployment

pub mod fsm;
pub mod orchestrator;
pub mod reconciler;
pub mod tracker;

pub use orchestrator::{ServiceMetrics, ServiceOrchestrator};
pub use reconciler::ReconcileReport;
pub use tracker::DeploymentTracker;
