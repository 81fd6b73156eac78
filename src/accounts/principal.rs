//! System user and group for the exporter daemon.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CommandErrorKind, OperatorError, OperatorResult};
use crate::executor::{sanitize_output, SubprocessResult};
use crate::host::{Host, HostCommand};
use crate::validation::validate_account_name;

const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

// shadow-utils exit codes
const EXIT_NAME_IN_USE: i32 = 9;
const EXIT_NOT_FOUND: i32 = 6;

/// Identifiers of the dedicated service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub name: String,
    pub group: String,
}

impl ServiceAccount {
    /// Create an account description after validating both names.
    pub fn new(name: &str, group: &str) -> OperatorResult<Self> {
        validate_account_name(name)?;
        validate_account_name(group)?;
        Ok(Self {
            name: name.to_string(),
            group: group.to_string(),
        })
    }
}

/// Runs the host's user and group management tools.
pub struct AccountManager<'a, H: Host> {
    host: &'a H,
    timeout: Duration,
}

impl<'a, H: Host> AccountManager<'a, H> {
    pub fn new(host: &'a H, timeout: Duration) -> Self {
        Self { host, timeout }
    }

    /// Create the system group, then a system user with no home and no login
    /// shell in that group.
    ///
    /// A principal that already exists counts as created. This is decided
    /// from the tool's exit status, not assumed.
    pub fn ensure_service_account(&self, account: &ServiceAccount) -> OperatorResult<()> {
        debug!(group = %account.group, "Creating service group");
        let result = self.run("groupadd", &["--system", account.group.as_str()])?;
        if already_exists(&result) {
            debug!(group = %account.group, "Service group already exists");
        } else {
            check("groupadd", &account.group, &result)?;
        }

        debug!(user = %account.name, "Creating service user");
        let result = self.run(
            "useradd",
            &[
                "--system",
                "--no-create-home",
                "--gid",
                account.group.as_str(),
                "--shell",
                NOLOGIN_SHELL,
                account.name.as_str(),
            ],
        )?;
        if already_exists(&result) {
            debug!(user = %account.name, "Service user already exists");
        } else {
            check("useradd", &account.name, &result)?;
        }

        info!(user = %account.name, group = %account.group, "Service account ensured");
        Ok(())
    }

    /// Delete the user, then the group. Absence is success.
    pub fn remove_service_account(&self, account: &ServiceAccount) -> OperatorResult<()> {
        let result = self.run("userdel", &[account.name.as_str()])?;
        if result.exit_code == Some(EXIT_NOT_FOUND) {
            debug!(user = %account.name, "Service user already absent");
        } else {
            check("userdel", &account.name, &result)?;
        }

        let result = self.run("groupdel", &[account.group.as_str()])?;
        if result.exit_code == Some(EXIT_NOT_FOUND) {
            debug!(group = %account.group, "Service group already absent");
        } else {
            check("groupdel", &account.group, &result)?;
        }

        info!(user = %account.name, group = %account.group, "Service account removed");
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> OperatorResult<SubprocessResult> {
        let command = HostCommand::new(program)
            .args(args.iter().copied())
            .timeout(self.timeout);
        self.host.run(&command)
    }
}

fn already_exists(result: &SubprocessResult) -> bool {
    !result.success
        && (result.exit_code == Some(EXIT_NAME_IN_USE)
            || result.stderr.contains("already exists"))
}

fn check(tool: &str, name: &str, result: &SubprocessResult) -> OperatorResult<()> {
    if result.success {
        return Ok(());
    }

    let exit_code = result.exit_code.unwrap_or(-1);
    let stderr = sanitize_output(&result.stderr, 5);
    warn!(tool = %tool, name = %name, exit_code, stderr = %stderr, "Account command failed");

    Err(OperatorError::Command {
        kind: CommandErrorKind::ExecutionFailed {
            message: format!("{} {} failed (exit {}): {}", tool, name, exit_code, stderr),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::path::Path;

    /// Keeps an in-memory passwd/group database and answers like shadow-utils.
    #[derive(Default)]
    struct AccountsHost {
        users: RefCell<BTreeSet<String>>,
        groups: RefCell<BTreeSet<String>>,
        commands: RefCell<Vec<String>>,
    }

    impl Host for AccountsHost {
        fn run(&self, command: &HostCommand) -> OperatorResult<SubprocessResult> {
            self.commands.borrow_mut().push(command.command_line());
            let name = command.args.last().cloned().unwrap_or_default();
            let result = match command.program.as_str() {
                "groupadd" => {
                    if self.groups.borrow_mut().insert(name.clone()) {
                        SubprocessResult::ok("")
                    } else {
                        SubprocessResult::failed(9, format!("groupadd: group '{}' already exists", name))
                    }
                }
                "useradd" => {
                    if self.users.borrow_mut().insert(name.clone()) {
                        SubprocessResult::ok("")
                    } else {
                        SubprocessResult::failed(9, format!("useradd: user '{}' already exists", name))
                    }
                }
                "userdel" => {
                    if self.users.borrow_mut().remove(&name) {
                        SubprocessResult::ok("")
                    } else {
                        SubprocessResult::failed(6, format!("userdel: user '{}' does not exist", name))
                    }
                }
                "groupdel" => {
                    if self.groups.borrow_mut().remove(&name) {
                        SubprocessResult::ok("")
                    } else {
                        SubprocessResult::failed(6, format!("groupdel: group '{}' does not exist", name))
                    }
                }
                other => panic!("unexpected program {other}"),
            };
            Ok(result)
        }

        fn fetch(&self, _url: &str, _dest: &Path) -> OperatorResult<()> {
            unreachable!()
        }

        fn chown(&self, _path: &Path, _user: &str, _group: &str) -> OperatorResult<()> {
            unreachable!()
        }
    }

    fn account() -> ServiceAccount {
        ServiceAccount::new("ipmi_exporter", "ipmi_exporter").unwrap()
    }

    #[test]
    fn test_ensure_creates_group_then_user() {
        let host = AccountsHost::default();
        let manager = AccountManager::new(&host, Duration::from_secs(5));

        manager.ensure_service_account(&account()).unwrap();

        assert_eq!(
            *host.commands.borrow(),
            vec![
                "groupadd --system ipmi_exporter",
                "useradd --system --no-create-home --gid ipmi_exporter --shell /usr/sbin/nologin ipmi_exporter",
            ]
        );
        assert!(host.users.borrow().contains("ipmi_exporter"));
    }

    #[test]
    fn test_ensure_twice_is_idempotent() {
        let host = AccountsHost::default();
        let manager = AccountManager::new(&host, Duration::from_secs(5));

        manager.ensure_service_account(&account()).unwrap();
        manager.ensure_service_account(&account()).unwrap();

        assert_eq!(host.users.borrow().len(), 1);
        assert_eq!(host.groups.borrow().len(), 1);
    }

    #[test]
    fn test_remove_absent_account_succeeds() {
        let host = AccountsHost::default();
        let manager = AccountManager::new(&host, Duration::from_secs(5));

        manager.remove_service_account(&account()).unwrap();

        assert_eq!(
            *host.commands.borrow(),
            vec!["userdel ipmi_exporter", "groupdel ipmi_exporter"]
        );
    }

    #[test]
    fn test_other_failures_surface() {
        struct BrokenHost;
        impl Host for BrokenHost {
            fn run(&self, _command: &HostCommand) -> OperatorResult<SubprocessResult> {
                Ok(SubprocessResult::failed(10, "groupadd: cannot lock /etc/group"))
            }
            fn fetch(&self, _url: &str, _dest: &Path) -> OperatorResult<()> {
                unreachable!()
            }
            fn chown(&self, _path: &Path, _user: &str, _group: &str) -> OperatorResult<()> {
                unreachable!()
            }
        }

        let manager = AccountManager::new(&BrokenHost, Duration::from_secs(5));
        let err = manager.ensure_service_account(&account()).unwrap_err();
        assert!(err.to_string().contains("cannot lock"));
    }

    #[test]
    fn test_reserved_name_rejected() {
        assert!(ServiceAccount::new("root", "ipmi_exporter").is_err());
    }
}
