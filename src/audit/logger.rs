//! Journal writer.
//!
//! Appends entries as JSON lines, one object per line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{OperatorError, OperatorResult};

use super::entry::AuditEntry;

/// Appends lifecycle journal entries to a file, or discards them when
/// journaling is disabled.
pub struct AuditLogger {
    sink: Option<(File, PathBuf)>,
}

impl AuditLogger {
    /// Open `path` for appending, creating its directory if needed.
    pub fn new(path: &Path) -> OperatorResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating journal directory");
                std::fs::create_dir_all(parent)
                    .map_err(|e| OperatorError::install_io(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OperatorError::install_io(path, e))?;

        debug!(path = %path.display(), "Journal opened");

        Ok(Self {
            sink: Some((file, path.to_path_buf())),
        })
    }

    /// A logger that drops every entry.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Append one entry and sync it to disk.
    pub fn log(&mut self, entry: &AuditEntry) -> OperatorResult<()> {
        let Some((file, _)) = self.sink.as_mut() else {
            return Ok(());
        };

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync journal");
        }

        debug!(run_id = %entry.run_id, event = %entry.event, "Journal entry written");
        Ok(())
    }

    /// Path of the journal file, if journaling is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(_, path)| path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(event: &str) -> AuditEntry {
        AuditEntry::new(Uuid::nil(), event, "active").succeeded("active", None, 3)
    }

    #[test]
    fn test_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("log/journal.log");

        let logger = AuditLogger::new(&log_path).unwrap();
        assert!(log_path.parent().unwrap().exists());
        assert_eq!(logger.path(), Some(log_path.as_path()));
    }

    #[test]
    fn test_appends_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("journal.log");

        {
            let mut logger = AuditLogger::new(&log_path).unwrap();
            logger.log(&entry("install")).unwrap();
        }
        {
            let mut logger = AuditLogger::new(&log_path).unwrap();
            logger.log(&entry("start")).unwrap();
        }

        let content = std::fs::read_to_string(&log_path).unwrap();
        let events: Vec<String> = content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events, vec!["install", "start"]);
    }

    #[test]
    fn test_disabled_logger() {
        let mut logger = AuditLogger::disabled();
        assert!(logger.log(&entry("stop")).is_ok());
        assert!(logger.path().is_none());
    }
}
