//! Service unit management.
//!
//! Registers the exporter with systemd and issues start, stop, restart,
//! enable and disable commands for it.

mod manager;
mod unit;

pub use manager::ServiceUnitManager;
pub use unit::{ExporterUnit, ServiceUnitState};
