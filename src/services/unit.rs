//! Service unit definition and observed state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// State of the exporter unit as seen by the host supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceUnitState {
    Unregistered,
    RegisteredDisabled,
    RegisteredEnabledStopped,
    Running,
}

impl ServiceUnitState {
    /// Whether a unit definition is installed.
    pub fn is_registered(&self) -> bool {
        !matches!(self, ServiceUnitState::Unregistered)
    }

    /// Whether `start` may be issued from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            ServiceUnitState::RegisteredEnabledStopped | ServiceUnitState::Running
        )
    }
}

impl fmt::Display for ServiceUnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceUnitState::Unregistered => "unregistered",
            ServiceUnitState::RegisteredDisabled => "registered-disabled",
            ServiceUnitState::RegisteredEnabledStopped => "registered-enabled-stopped",
            ServiceUnitState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Everything the supervisor needs to know about the exporter daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterUnit {
    /// Unit name used with systemctl.
    pub name: String,
    /// Where the unit definition is installed.
    pub unit_file: PathBuf,
    pub user: String,
    pub group: String,
    pub binary: PathBuf,
    pub config_file: PathBuf,
    pub sysconfig: PathBuf,
}

impl ExporterUnit {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.service.unit_name.clone(),
            unit_file: settings.paths.unit_file.clone(),
            user: settings.service.user.clone(),
            group: settings.service.group.clone(),
            binary: settings.paths.binary.clone(),
            config_file: settings.paths.config_file.clone(),
            sysconfig: settings.paths.sysconfig.clone(),
        }
    }

    pub fn unit_file(&self) -> &Path {
        &self.unit_file
    }

    /// Variables for the unit definition template.
    pub fn template_variables(&self) -> serde_json::Value {
        serde_json::json!({
            "user": self.user,
            "group": self.group,
            "binary": self.binary.display().to_string(),
            "config_file": self.config_file.display().to_string(),
            "sysconfig": self.sysconfig.display().to_string(),
        })
    }
}
