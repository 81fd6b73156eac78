//! OS package dependency of the exporter.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CommandErrorKind, OperatorError, OperatorResult};
use crate::executor::sanitize_output;
use crate::host::{Host, HostCommand};

/// Installs a Debian package only when it is not already installed.
pub struct PackageInstaller<'a, H: Host> {
    host: &'a H,
    query_timeout: Duration,
    install_timeout: Duration,
}

impl<'a, H: Host> PackageInstaller<'a, H> {
    pub fn new(host: &'a H, query_timeout: Duration, install_timeout: Duration) -> Self {
        Self {
            host,
            query_timeout,
            install_timeout,
        }
    }

    /// Whether dpkg reports `package` as fully installed.
    pub fn is_installed(&self, package: &str) -> OperatorResult<bool> {
        let command = HostCommand::new("dpkg-query")
            .args(["-W", "-f=${Status}", package])
            .timeout(self.query_timeout);
        let result = self.host.run(&command)?;

        // Unknown packages exit 1 with "no packages found"
        Ok(result.success && result.stdout.trim().ends_with("install ok installed"))
    }

    /// Install `package` unless it is already present.
    ///
    /// Returns `true` if the package manager was invoked.
    pub fn ensure_installed(&self, package: &str) -> OperatorResult<bool> {
        if self.is_installed(package)? {
            debug!(package = %package, "Package already installed");
            return Ok(false);
        }

        info!(package = %package, "Installing package");
        let command = HostCommand::new("apt-get")
            .args(["install", "-y", "-q", "--no-install-recommends", package])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .timeout(self.install_timeout);
        let result = self.host.run(&command)?;

        if !result.success {
            let stderr = sanitize_output(&result.stderr, 10);
            warn!(package = %package, exit_code = ?result.exit_code, stderr = %stderr, "Package install failed");
            return Err(OperatorError::Command {
                kind: CommandErrorKind::ExecutionFailed {
                    message: format!("apt-get install {} failed: {}", package, stderr),
                },
            });
        }

        info!(package = %package, "Package installed");
        Ok(true)
    }
}
