//! Data models

pub mod deployment;
pub mod service;
pub mod template;
pub mod tenant;
