//! Service deployment orchestrator
//!
//! Turns tenant service declarations into Nomad jobs, tracks each
//! submission as a deployment and keeps recorded state in line with the
//! scheduler.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod store;
pub mod templates;
pub mod version;
pub mod workers;
