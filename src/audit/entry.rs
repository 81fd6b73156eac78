//! Journal entry types.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One handled lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp, millisecond precision, UTC.
    pub timestamp: String,
    /// Identifier of this operator invocation.
    pub run_id: Uuid,
    /// Lifecycle event name, e.g. `config-changed`.
    pub event: String,
    /// Phase when handling began.
    pub phase_before: String,
    /// Phase when handling ended.
    pub phase_after: String,
    /// Exporter options in effect, if the event carried any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
    pub result: AuditResult,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Start an entry stamped with the current time.
    pub fn new(run_id: Uuid, event: &str, phase_before: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            run_id,
            event: event.to_string(),
            phase_before: phase_before.to_string(),
            phase_after: phase_before.to_string(),
            options: None,
            result: AuditResult::Success {
                workload_version: None,
            },
            duration_ms: 0,
        }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Record a successful outcome.
    pub fn succeeded(mut self, phase_after: &str, workload_version: Option<String>, duration_ms: u64) -> Self {
        self.phase_after = phase_after.to_string();
        self.result = AuditResult::Success { workload_version };
        self.duration_ms = duration_ms;
        self
    }

    /// Record a failed outcome.
    pub fn failed(
        mut self,
        phase_after: &str,
        error_code: &str,
        error_message: String,
        duration_ms: u64,
    ) -> Self {
        self.phase_after = phase_after.to_string();
        self.result = AuditResult::Failure {
            error_code: error_code.to_string(),
            error_message,
        };
        self.duration_ms = duration_ms;
        self
    }
}

/// How an event ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum AuditResult {
    #[serde(rename = "success")]
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        workload_version: Option<String>,
    },
    #[serde(rename = "failure")]
    Failure {
        error_code: String,
        error_message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialization() {
        let entry = AuditEntry::new(Uuid::nil(), "install", "uninstalled")
            .with_options(serde_json::json!({"listen-address": "0.0.0.0:9290"}))
            .succeeded("active", Some("1.9.0".to_string()), 1200);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"event\":\"install\""));
        assert!(json.contains("\"phase_after\":\"active\""));
        assert!(json.contains("\"workload_version\":\"1.9.0\""));
        assert!(json.contains("\"duration_ms\":1200"));
    }

    #[test]
    fn test_run_id_is_hyphenated_string() {
        let run_id = Uuid::new_v4();
        let entry = AuditEntry::new(run_id, "stop", "active").succeeded("uninstalled", None, 5);

        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["run_id"], run_id.to_string());
        assert_eq!(value["run_id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_failure_serialization() {
        let entry = AuditEntry::new(Uuid::nil(), "install", "uninstalled").failed(
            "installing",
            "PROVISION_ERROR",
            "Provisioning failed at step 'install-binary'".to_string(),
            40,
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"failure\""));
        assert!(json.contains("\"error_code\":\"PROVISION_ERROR\""));
        assert!(!json.contains("\"options\""));
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let entry = AuditEntry::new(Uuid::nil(), "start", "active");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
        assert!(entry.timestamp.ends_with('Z'));
    }
}
