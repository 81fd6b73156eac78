//! Service unit manager.
//!
//! The only component allowed to change the exporter's [`ServiceUnitState`].
//! Every supervisor command is issued once; a non-zero exit is reported as
//! [`OperatorError::ServiceControl`] and never retried here.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{OperatorError, OperatorResult};
use crate::executor::{sanitize_output, SubprocessResult};
use crate::host::{fs, Host, HostCommand};

use super::unit::{ExporterUnit, ServiceUnitState};

const SYSTEMCTL: &str = "systemctl";
const UNIT_FILE_MODE: u32 = 0o644;

/// Drives the host supervisor for the exporter unit.
pub struct ServiceUnitManager<'a, H: Host> {
    host: &'a H,
    unit: &'a ExporterUnit,
    timeout: Duration,
}

impl<'a, H: Host> ServiceUnitManager<'a, H> {
    pub fn new(host: &'a H, unit: &'a ExporterUnit, timeout: Duration) -> Self {
        Self {
            host,
            unit,
            timeout,
        }
    }

    /// Install the unit definition, reload the supervisor and enable the unit.
    ///
    /// Re-registering replaces the definition and is safe to repeat.
    pub fn register(&self, definition: &str) -> OperatorResult<()> {
        fs::write_atomic(self.unit.unit_file(), definition.as_bytes(), UNIT_FILE_MODE)?;
        self.daemon_reload()?;
        self.enable()?;
        info!(unit = %self.unit.name, "Service unit registered");
        Ok(())
    }

    /// Disable the unit, delete its definition and reload the supervisor.
    ///
    /// An already absent unit is not an error.
    pub fn deregister(&self) -> OperatorResult<()> {
        if self.unit.unit_file().exists() {
            self.disable()?;
        } else {
            debug!(unit = %self.unit.name, "Unit file absent, skipping disable");
        }
        self.remove_definition()?;
        info!(unit = %self.unit.name, "Service unit deregistered");
        Ok(())
    }

    fn remove_definition(&self) -> OperatorResult<()> {
        fs::remove_file_if_exists(self.unit.unit_file())?;
        self.daemon_reload()
    }

    pub fn start(&self) -> OperatorResult<()> {
        self.control("start")
    }

    pub fn stop(&self) -> OperatorResult<()> {
        self.control("stop")
    }

    pub fn restart(&self) -> OperatorResult<()> {
        self.control("restart")
    }

    pub fn enable(&self) -> OperatorResult<()> {
        self.control("enable")
    }

    pub fn disable(&self) -> OperatorResult<()> {
        self.control("disable")
    }

    /// Probe the current unit state.
    pub fn state(&self) -> OperatorResult<ServiceUnitState> {
        if !self.unit.unit_file().exists() {
            return Ok(ServiceUnitState::Unregistered);
        }

        // is-enabled and is-active report through their exit code and stdout
        let enabled = self.query("is-enabled")?;
        let active = self.query("is-active")?;

        let state = if active.success && active.stdout.trim() == "active" {
            ServiceUnitState::Running
        } else if enabled.success && enabled.stdout.trim() == "enabled" {
            ServiceUnitState::RegisteredEnabledStopped
        } else {
            ServiceUnitState::RegisteredDisabled
        };

        debug!(unit = %self.unit.name, state = %state, "Service unit state");
        Ok(state)
    }

    fn daemon_reload(&self) -> OperatorResult<()> {
        let command = HostCommand::new(SYSTEMCTL)
            .args(["daemon-reload"])
            .timeout(self.timeout);
        let result = self.host.run(&command)?;
        self.check("daemon-reload", result)
    }

    fn control(&self, action: &str) -> OperatorResult<()> {
        debug!(unit = %self.unit.name, action = %action, "Issuing service command");
        let result = self.query(action)?;
        self.check(action, result)?;
        info!(unit = %self.unit.name, action = %action, "Service command succeeded");
        Ok(())
    }

    fn query(&self, action: &str) -> OperatorResult<SubprocessResult> {
        let command = HostCommand::new(SYSTEMCTL)
            .args([action, self.unit.name.as_str()])
            .timeout(self.timeout);
        self.host.run(&command)
    }

    fn check(&self, action: &str, result: SubprocessResult) -> OperatorResult<()> {
        if result.success {
            return Ok(());
        }

        let message = sanitize_output(&result.combined_output(), 10);
        warn!(
            unit = %self.unit.name,
            action = %action,
            exit_code = ?result.exit_code,
            output = %message,
            "Service command failed"
        );
        Err(OperatorError::ServiceControl {
            unit: self.unit.name.clone(),
            action: action.to_string(),
            exit_code: result.exit_code,
            message,
        })
    }
}
