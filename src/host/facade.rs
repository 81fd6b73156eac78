//! The [`Host`] trait and its production implementation.

use std::path::Path;
use std::time::Duration;

use nix::unistd::{chown, Group, User};
use tracing::debug;

use crate::error::{OperatorError, OperatorResult};
use crate::executor::{SubprocessBuilder, SubprocessResult};

use super::fetch::HttpFetcher;

/// A process invocation requested from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HostCommand {
    /// Create a command with the default 60 second timeout.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Set the timeout for the command.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments joined by spaces, for logs and test assertions.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Capabilities the operator needs from the machine it manages.
///
/// All calls are blocking. Implementations must not retry on their own;
/// retry policy belongs to the lifecycle controller.
pub trait Host {
    /// Run a process to completion and capture its output.
    ///
    /// A non-zero exit is returned as a result, not an error. Errors are
    /// reserved for spawn failures and timeouts.
    fn run(&self, command: &HostCommand) -> OperatorResult<SubprocessResult>;

    /// Download `url` into the file at `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> OperatorResult<()>;

    /// Change ownership of `path` to the named user and group.
    fn chown(&self, path: &Path, user: &str, group: &str) -> OperatorResult<()>;
}

/// The real host: subprocesses, HTTPS downloads, and Unix ownership.
pub struct SystemHost {
    fetcher: HttpFetcher,
}

impl SystemHost {
    /// Create a system host whose downloads give up after `download_timeout`.
    pub fn new(download_timeout: Duration) -> OperatorResult<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new(download_timeout)?,
        })
    }
}

impl Host for SystemHost {
    fn run(&self, command: &HostCommand) -> OperatorResult<SubprocessResult> {
        let mut builder = SubprocessBuilder::new(&command.program)
            .args(&command.args)
            .timeout(command.timeout);
        for (key, value) in &command.env {
            builder = builder.env(key, value);
        }
        builder.run()
    }

    fn fetch(&self, url: &str, dest: &Path) -> OperatorResult<()> {
        self.fetcher.fetch(url, dest)
    }

    fn chown(&self, path: &Path, user: &str, group: &str) -> OperatorResult<()> {
        let uid = User::from_name(user)
            .map_err(|e| OperatorError::install_io(path, e.into()))?
            .ok_or_else(|| {
                OperatorError::install_io(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("user '{}' does not exist", user),
                    ),
                )
            })?
            .uid;
        let gid = Group::from_name(group)
            .map_err(|e| OperatorError::install_io(path, e.into()))?
            .ok_or_else(|| {
                OperatorError::install_io(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("group '{}' does not exist", group),
                    ),
                )
            })?
            .gid;

        chown(path, Some(uid), Some(gid)).map_err(|e| OperatorError::install_io(path, e.into()))?;

        debug!(path = %path.display(), user = %user, group = %group, "Ownership set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_command_line() {
        let cmd = HostCommand::new("systemctl").args(["restart", "ipmi_exporter"]);
        assert_eq!(cmd.command_line(), "systemctl restart ipmi_exporter");
        assert_eq!(cmd.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_system_host_runs_processes() {
        let host = SystemHost::new(Duration::from_secs(5)).unwrap();
        let result = host
            .run(&HostCommand::new("sh").args(["-c", "echo $GREETING"]).env("GREETING", "hi"))
            .unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "hi");
    }

    #[test]
    fn test_chown_unknown_user_fails() {
        let host = SystemHost::new(Duration::from_secs(5)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = host.chown(dir.path(), "no_such_user_xyz", "no_such_group_xyz");
        assert!(matches!(result, Err(OperatorError::InstallIo { .. })));
    }
}
