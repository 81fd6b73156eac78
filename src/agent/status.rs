//! Unit status reporting.

use std::cell::RefCell;
use std::io::{self, Write};

use serde::Serialize;

use crate::error::{OperatorError, OperatorResult};

/// Unit status shown by the orchestration agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Maintenance,
    Active,
    Blocked,
}

/// One update sent to the orchestration agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StatusUpdate {
    Status {
        status: UnitStatus,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    WorkloadVersion {
        version: String,
    },
}

/// Receives status and version updates while an event is handled.
pub trait StatusReporter {
    fn report(&self, update: StatusUpdate) -> OperatorResult<()>;

    fn set_status(&self, status: UnitStatus, message: &str) -> OperatorResult<()> {
        self.report(StatusUpdate::Status {
            status,
            message: message.to_string(),
            code: None,
        })
    }

    fn set_workload_version(&self, version: &str) -> OperatorResult<()> {
        self.report(StatusUpdate::WorkloadVersion {
            version: version.to_string(),
        })
    }

    /// Report a failed event as `Blocked` with the error's message and code.
    fn set_blocked(&self, error: &OperatorError) -> OperatorResult<()> {
        self.report(StatusUpdate::Status {
            status: UnitStatus::Blocked,
            message: error.to_string(),
            code: Some(error.code().to_string()),
        })
    }
}

/// Writes each update as one JSON object per line.
pub struct JsonStatusReporter<W: Write> {
    out: RefCell<W>,
}

impl JsonStatusReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStatusReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> StatusReporter for JsonStatusReporter<W> {
    fn report(&self, update: StatusUpdate) -> OperatorResult<()> {
        let line = serde_json::to_string(&update)?;
        let mut out = self.out.borrow_mut();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps updates in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryStatusReporter {
    updates: RefCell<Vec<StatusUpdate>>,
}

impl MemoryStatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.borrow().clone()
    }

    /// The most recent unit status and message.
    pub fn last_status(&self) -> Option<(UnitStatus, String)> {
        self.updates.borrow().iter().rev().find_map(|update| match update {
            StatusUpdate::Status {
                status, message, ..
            } => Some((*status, message.clone())),
            StatusUpdate::WorkloadVersion { .. } => None,
        })
    }

    /// The most recent workload version.
    pub fn workload_version(&self) -> Option<String> {
        self.updates.borrow().iter().rev().find_map(|update| match update {
            StatusUpdate::WorkloadVersion { version } => Some(version.clone()),
            StatusUpdate::Status { .. } => None,
        })
    }
}

impl StatusReporter for MemoryStatusReporter {
    fn report(&self, update: StatusUpdate) -> OperatorResult<()> {
        self.updates.borrow_mut().push(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines() {
        let reporter = JsonStatusReporter::new(Vec::new());
        reporter
            .set_status(UnitStatus::Maintenance, "Installing ipmi-exporter")
            .unwrap();
        reporter.set_workload_version("1.9.0").unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines[0]["kind"], "status");
        assert_eq!(lines[0]["status"], "maintenance");
        assert_eq!(lines[0]["message"], "Installing ipmi-exporter");
        assert!(lines[0].get("code").is_none());
        assert_eq!(lines[1]["kind"], "workload-version");
        assert_eq!(lines[1]["version"], "1.9.0");
    }

    #[test]
    fn test_blocked_carries_code() {
        let reporter = MemoryStatusReporter::new();
        let error = OperatorError::VersionParse {
            output: "garbage".to_string(),
        };
        reporter.set_blocked(&error).unwrap();

        match &reporter.updates()[0] {
            StatusUpdate::Status { status, code, .. } => {
                assert_eq!(*status, UnitStatus::Blocked);
                assert_eq!(code.as_deref(), Some("VERSION_PARSE_ERROR"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn test_memory_reporter_latest() {
        let reporter = MemoryStatusReporter::new();
        reporter.set_status(UnitStatus::Maintenance, "a").unwrap();
        reporter.set_workload_version("1.9.0").unwrap();
        reporter.set_status(UnitStatus::Active, "b").unwrap();

        assert_eq!(reporter.last_status(), Some((UnitStatus::Active, "b".to_string())));
        assert_eq!(reporter.workload_version().as_deref(), Some("1.9.0"));
    }
}
