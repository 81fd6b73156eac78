//! Named provisioning steps and their fixed order.
//!
//! No step is rolled back when a later one fails. A retried install re-runs
//! the whole sequence, so every step must converge on the same end state no
//! matter how often it runs or where a previous attempt stopped.

use std::fmt;

use serde::Serialize;

/// One idempotent unit of provisioning or teardown work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStep {
    /// Download the release and atomically replace the binary. Re-running
    /// downloads again and overwrites with identical content.
    InstallBinary,
    /// Install the IPMI tool package. Skipped when dpkg reports it installed.
    InstallDependencies,
    /// Create group then user. "Already exists" exit statuses count as done.
    EnsureServiceAccount,
    /// Render and atomically write the exporter YAML.
    WriteExporterConfig,
    /// Render and atomically write the sudoers rule.
    GrantPrivileges,
    /// Write the unit file, daemon-reload, enable. All three repeat safely.
    RegisterServiceUnit,
    /// Replace the sysconfig file and re-own the state directories.
    RenderSysconfig,
    /// Stop the unit if it is registered.
    StopService,
    /// Disable the unit if its file exists, delete the file and
    /// daemon-reload. An absent unit only gets the reload.
    DeregisterService,
    /// Delete the sudoers rule; absent is fine.
    RevokePrivileges,
    /// Delete binary, config, sysconfig and state directories; absent is fine.
    RemoveArtifacts,
    /// userdel then groupdel; "does not exist" exit statuses count as done.
    RemoveServiceAccount,
}

/// Order of the install sequence. The unit is registered only after the
/// binary and the service account exist, and it is never started here.
pub const INSTALL_SEQUENCE: [ProvisionStep; 7] = [
    ProvisionStep::InstallBinary,
    ProvisionStep::InstallDependencies,
    ProvisionStep::EnsureServiceAccount,
    ProvisionStep::WriteExporterConfig,
    ProvisionStep::GrantPrivileges,
    ProvisionStep::RegisterServiceUnit,
    ProvisionStep::RenderSysconfig,
];

/// Order of the teardown sequence: stop using things before deleting them.
pub const TEARDOWN_SEQUENCE: [ProvisionStep; 5] = [
    ProvisionStep::StopService,
    ProvisionStep::DeregisterService,
    ProvisionStep::RevokePrivileges,
    ProvisionStep::RemoveArtifacts,
    ProvisionStep::RemoveServiceAccount,
];

impl ProvisionStep {
    pub fn name(&self) -> &'static str {
        match self {
            ProvisionStep::InstallBinary => "install-binary",
            ProvisionStep::InstallDependencies => "install-dependencies",
            ProvisionStep::EnsureServiceAccount => "ensure-service-account",
            ProvisionStep::WriteExporterConfig => "write-exporter-config",
            ProvisionStep::GrantPrivileges => "grant-privileges",
            ProvisionStep::RegisterServiceUnit => "register-service-unit",
            ProvisionStep::RenderSysconfig => "render-sysconfig",
            ProvisionStep::StopService => "stop-service",
            ProvisionStep::DeregisterService => "deregister-service",
            ProvisionStep::RevokePrivileges => "revoke-privileges",
            ProvisionStep::RemoveArtifacts => "remove-artifacts",
            ProvisionStep::RemoveServiceAccount => "remove-service-account",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(sequence: &[ProvisionStep], step: ProvisionStep) -> usize {
        sequence.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_unit_registered_after_binary_and_account() {
        let register = position(&INSTALL_SEQUENCE, ProvisionStep::RegisterServiceUnit);
        assert!(position(&INSTALL_SEQUENCE, ProvisionStep::InstallBinary) < register);
        assert!(position(&INSTALL_SEQUENCE, ProvisionStep::EnsureServiceAccount) < register);
    }

    #[test]
    fn test_teardown_stops_before_deleting() {
        let stop = position(&TEARDOWN_SEQUENCE, ProvisionStep::StopService);
        assert_eq!(stop, 0);
        assert!(
            position(&TEARDOWN_SEQUENCE, ProvisionStep::DeregisterService)
                < position(&TEARDOWN_SEQUENCE, ProvisionStep::RemoveArtifacts)
        );
        assert_eq!(
            TEARDOWN_SEQUENCE.last(),
            Some(&ProvisionStep::RemoveServiceAccount)
        );
    }

    #[test]
    fn test_sequences_are_disjoint() {
        for step in INSTALL_SEQUENCE {
            assert!(!TEARDOWN_SEQUENCE.contains(&step), "{step}");
        }
    }
}
