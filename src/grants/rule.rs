//! The sudoers rule for the exporter's service account.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{OperatorError, OperatorResult, ValidationErrorKind};
use crate::host::fs;
use crate::templates::{TemplateEngine, SUDOERS};

/// sudo refuses rule files that are group or world writable.
const GRANT_FILE_MODE: u32 = 0o440;

/// FreeIPMI tools the exporter invokes through sudo.
pub const HELPER_COMMANDS: &[&str] = &[
    "/usr/sbin/ipmimonitoring",
    "/usr/sbin/ipmi-sensors",
    "/usr/sbin/ipmi-dcmi",
    "/usr/sbin/ipmi-raw",
    "/usr/sbin/bmc-info",
    "/usr/sbin/ipmi-chassis",
    "/usr/sbin/ipmi-sel",
];

/// Render the rule granting `account` passwordless use of `commands`.
///
/// Each command must be an absolute path to a single binary. Wildcards,
/// arguments, and the `ALL` alias are rejected.
pub fn render_grant(
    engine: &TemplateEngine,
    account: &str,
    commands: &[&str],
) -> OperatorResult<String> {
    if commands.is_empty() {
        return Err(rejected("", "allow-list is empty"));
    }
    for command in commands {
        validate_command(command)?;
    }

    engine.render(
        SUDOERS,
        &serde_json::json!({
            "account": account,
            "commands": commands,
        }),
    )
}

fn validate_command(command: &str) -> OperatorResult<()> {
    if command.eq_ignore_ascii_case("ALL") {
        return Err(rejected(command, "blanket grants are not allowed"));
    }
    if !command.starts_with('/') {
        return Err(rejected(command, "command must be an absolute path"));
    }
    if let Some(c) = command
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, ',' | '*' | '?' | '[' | ']' | '\\' | ':' | '=' | '!'))
    {
        return Err(rejected(
            command,
            &format!("character '{}' is not allowed in a granted command", c),
        ));
    }
    if command.split('/').any(|part| part == "..") {
        return Err(rejected(command, "path traversal is not allowed"));
    }
    Ok(())
}

fn rejected(command: &str, message: &str) -> OperatorError {
    OperatorError::Validation {
        kind: ValidationErrorKind::GrantRejected {
            command: command.to_string(),
            message: message.to_string(),
        },
    }
}

/// Owns the grant file on disk.
pub struct GrantManager<'a> {
    engine: &'a TemplateEngine,
    path: PathBuf,
}

impl<'a> GrantManager<'a> {
    pub fn new(engine: &'a TemplateEngine, path: &Path) -> Self {
        Self {
            engine,
            path: path.to_path_buf(),
        }
    }

    /// Atomically write the rule for `account` over any previous one.
    pub fn grant(&self, account: &str, commands: &[&str]) -> OperatorResult<()> {
        let rule = render_grant(self.engine, account, commands)?;
        fs::write_atomic(&self.path, rule.as_bytes(), GRANT_FILE_MODE)?;
        info!(
            path = %self.path.display(),
            account = %account,
            commands = commands.len(),
            "Privilege grant written"
        );
        Ok(())
    }

    /// Delete the rule file. Absence is success.
    pub fn revoke(&self) -> OperatorResult<()> {
        if fs::remove_file_if_exists(&self.path)? {
            info!(path = %self.path.display(), "Privilege grant revoked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn granted_commands(rule: &str) -> Vec<String> {
        let (_, commands) = rule.split_once("NOPASSWD:").unwrap();
        commands.split(',').map(|c| c.trim().to_string()).collect()
    }

    #[test]
    fn test_rule_lists_exactly_the_helpers() {
        let engine = TemplateEngine::builtin().unwrap();
        let rule = render_grant(&engine, "ipmi_exporter", HELPER_COMMANDS).unwrap();

        assert!(rule.starts_with("ipmi_exporter ALL = NOPASSWD: "));
        let commands = granted_commands(&rule);
        assert_eq!(commands, HELPER_COMMANDS);
        assert!(!commands.iter().any(|c| c.eq_ignore_ascii_case("ALL")));
    }

    #[test]
    fn test_blanket_grant_rejected() {
        let engine = TemplateEngine::builtin().unwrap();
        for bad in ["ALL", "all", "ipmi-sensors", "/usr/sbin/*", "/usr/sbin/ipmi-raw 0x06", "/usr/../bin/sh"] {
            let result = render_grant(&engine, "ipmi_exporter", &["/usr/sbin/bmc-info", bad]);
            assert!(
                matches!(
                    result,
                    Err(OperatorError::Validation {
                        kind: ValidationErrorKind::GrantRejected { .. }
                    })
                ),
                "{bad} should be rejected"
            );
        }
        assert!(render_grant(&engine, "ipmi_exporter", &[]).is_err());
    }

    #[test]
    fn test_grant_and_revoke() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/sudoers.d/ipmi_exporter");
        let engine = TemplateEngine::builtin().unwrap();
        let manager = GrantManager::new(&engine, &path);

        manager.grant("ipmi_exporter", HELPER_COMMANDS).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o440);

        manager.revoke().unwrap();
        assert!(!path.exists());
        manager.revoke().unwrap();
    }

    #[test]
    fn test_failed_grant_leaves_previous_rule() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ipmi_exporter");
        let engine = TemplateEngine::builtin().unwrap();
        let manager = GrantManager::new(&engine, &path);

        manager.grant("ipmi_exporter", HELPER_COMMANDS).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(manager.grant("ipmi_exporter", &["ALL"]).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
