//! Workload version discovery.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::error::{OperatorError, OperatorResult};
use crate::host::{Host, HostCommand};

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+\.[0-9]+\.[0-9]+").expect("static regex is valid"))
}

/// Extract the first dotted version triple from `output`.
pub fn parse_version(output: &str) -> OperatorResult<String> {
    version_pattern()
        .find(output)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| OperatorError::VersionParse {
            output: output.trim().chars().take(200).collect(),
        })
}

/// Ask the installed binary for its version.
///
/// The exporter prints its version banner on stdout or stderr depending on
/// release, so both are searched.
pub fn query_version<H: Host>(host: &H, binary: &Path, timeout: Duration) -> OperatorResult<String> {
    let command = HostCommand::new(&binary.to_string_lossy())
        .args(["--version"])
        .timeout(timeout);
    let result = host.run(&command)?;
    debug!(exit_code = ?result.exit_code, "Version query finished");
    parse_version(&result.combined_output())
}
