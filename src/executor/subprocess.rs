//! Safe subprocess execution.
//!
//! Provides utilities for running host tools (systemctl, useradd, apt-get,
//! the exporter binary) with:
//! - No shell interpretation (direct exec)
//! - Enforced timeouts
//! - Captured stdout/stderr
//! - Environment control

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CommandErrorKind, OperatorError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a subprocess execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubprocessResult {
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// The exit code, if available.
    pub exit_code: Option<i32>,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl SubprocessResult {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, for tools that print to either stream.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Builder for a single direct-exec subprocess.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl SubprocessBuilder {
    /// Create a builder with a 60 second timeout.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add an environment variable on top of the inherited environment.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn the process and wait for it.
    ///
    /// A process still running after the timeout is killed and reported as
    /// [`CommandErrorKind::Timeout`]. A non-zero exit is not an error here;
    /// the caller inspects [`SubprocessResult`].
    pub fn run(self) -> Result<SubprocessResult, OperatorError> {
        debug!(
            program = %self.program,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs(),
            "Executing subprocess"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| execution_failed(format!("Failed to spawn {}: {}", self.program, e)))?;

        // Both pipes are drained while waiting so a chatty child never
        // blocks on a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = wait_with_timeout(&mut child, &self.program, self.timeout)?;
        let output = Output {
            status,
            stdout: collect(stdout, &self.program)?,
            stderr: collect(stderr, &self.program)?,
        };
        let result = SubprocessResult::from_output(output);

        debug!(
            program = %self.program,
            success = result.success,
            exit_code = ?result.exit_code,
            duration_ms = started.elapsed().as_millis() as u64,
            "Subprocess completed"
        );
        Ok(result)
    }
}

type PipeReader = Option<JoinHandle<io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> PipeReader {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: PipeReader, program: &str) -> Result<Vec<u8>, OperatorError> {
    let Some(handle) = reader else {
        return Ok(Vec::new());
    };
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(execution_failed(format!(
            "Failed to read output from {}: {}",
            program, e
        ))),
        Err(_) => Err(execution_failed(format!(
            "Output reader for {} panicked",
            program
        ))),
    }
}

/// Wait for `child`, killing it once `timeout` has passed.
///
/// On timeout the pipe readers are left detached; they finish when the
/// killed process's pipes close.
fn wait_with_timeout(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, OperatorError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() > timeout => {
                warn!(program = %program, timeout_secs = timeout.as_secs(), "Process timed out, killing");
                if let Err(e) = child.kill() {
                    warn!(error = %e, "Failed to kill timed-out process");
                }
                let _ = child.wait();
                return Err(OperatorError::Command {
                    kind: CommandErrorKind::Timeout {
                        timeout_secs: timeout.as_secs(),
                    },
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(execution_failed(format!(
                    "Failed to check status of {}: {}",
                    program, e
                )))
            }
        }
    }
}

fn execution_failed(message: String) -> OperatorError {
    OperatorError::Command {
        kind: CommandErrorKind::ExecutionFailed { message },
    }
}
