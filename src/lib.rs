//! IPMI Exporter Operator Library
//!
//! Provisions the Prometheus IPMI exporter on a single host and keeps it in
//! step with the lifecycle events and options delivered by an orchestration
//! agent: install, upgrade, configuration change, start and stop.

pub mod accounts;
pub mod agent;
pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod grants;
pub mod host;
pub mod lifecycle;
pub mod provision;
pub mod services;
pub mod templates;
pub mod validation;
