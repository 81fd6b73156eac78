//! Configuration for the exporter operator.
//!
//! Operator settings come from a TOML file; exporter options arrive with
//! each lifecycle event.

mod options;
mod settings;

pub use options::{Architecture, ExporterConfig, ExporterOptions};
pub use settings::*;

/// Default location of the operator settings file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ipmi-exporter-operator/operator.toml";
