//! Configuration settings for the exporter operator.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::OperatorError;
use crate::validation::validate_account_name;

use super::options::Architecture;

/// Main configuration structure for the operator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Filesystem layout of the managed exporter and of the operator's own state.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Installed exporter executable.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Exporter configuration YAML (its parent is the config directory).
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    /// Environment file read by the service unit at start time.
    #[serde(default = "default_sysconfig")]
    pub sysconfig: PathBuf,
    /// Exporter data directory, owned by the service account.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Privilege escalation rule file.
    #[serde(default = "default_sudoers")]
    pub sudoers: PathBuf,
    /// Service unit definition.
    #[serde(default = "default_unit_file")]
    pub unit_file: PathBuf,
    /// Directory under which download scratch directories are created.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Optional directory of `.tera` files overriding the built-in templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Persisted lifecycle phase.
    #[serde(default = "default_lifecycle_state")]
    pub lifecycle_state: PathBuf,
    /// Where the published metrics endpoint is written for consumers.
    #[serde(default = "default_endpoint_file")]
    pub endpoint_file: PathBuf,
    /// Grafana dashboards shipped alongside the operator.
    #[serde(default = "default_dashboards_dir")]
    pub dashboards_dir: PathBuf,
    /// Prometheus alert rules shipped alongside the operator.
    #[serde(default = "default_prometheus_rules_dir")]
    pub prometheus_rules_dir: PathBuf,
    /// Loki alert rules shipped alongside the operator.
    #[serde(default = "default_loki_rules_dir")]
    pub loki_rules_dir: PathBuf,
}

/// Release download configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Base URL of the release download area.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for the whole archive download in seconds.
    #[serde(default = "default_download_timeout")]
    pub timeout_seconds: u64,
    /// Architecture override; detected from the host when unset.
    #[serde(default)]
    pub architecture: Option<Architecture>,
}

/// Managed service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service unit name used with systemctl.
    #[serde(default = "default_unit_name")]
    pub unit_name: String,
    /// Service account user the daemon runs as.
    #[serde(default = "default_account")]
    pub user: String,
    /// Service account group.
    #[serde(default = "default_account")]
    pub group: String,
    /// OS package providing the privileged helper tools.
    #[serde(default = "default_dependency_package")]
    pub dependency_package: String,
    /// Timeout for supervisor and account commands in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Timeout for package installation in seconds.
    #[serde(default = "default_package_timeout")]
    pub package_timeout_seconds: u64,
}

/// Metrics endpoint publication.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// HTTP path the exporter serves metrics on.
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Address consumers should scrape when the exporter binds all interfaces.
    #[serde(default)]
    pub ingress_address: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Lifecycle journal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether every handled event is journaled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the journal file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_binary() -> PathBuf {
    PathBuf::from("/usr/bin/ipmi_exporter")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("/etc/ipmi_exporter/ipmi_exporter.yaml")
}

fn default_sysconfig() -> PathBuf {
    PathBuf::from("/etc/sysconfig/ipmi_exporter")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/ipmi_exporter")
}

fn default_sudoers() -> PathBuf {
    PathBuf::from("/etc/sudoers.d/ipmi_exporter")
}

fn default_unit_file() -> PathBuf {
    PathBuf::from("/etc/systemd/system/ipmi_exporter.service")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_lifecycle_state() -> PathBuf {
    PathBuf::from("/var/lib/ipmi-exporter-operator/state.json")
}

fn default_endpoint_file() -> PathBuf {
    PathBuf::from("/var/lib/ipmi-exporter-operator/endpoint.json")
}

fn default_dashboards_dir() -> PathBuf {
    PathBuf::from("/usr/share/ipmi-exporter-operator/grafana_dashboards")
}

fn default_prometheus_rules_dir() -> PathBuf {
    PathBuf::from("/usr/share/ipmi-exporter-operator/alert_rules/prometheus")
}

fn default_loki_rules_dir() -> PathBuf {
    PathBuf::from("/usr/share/ipmi-exporter-operator/alert_rules/loki")
}

fn default_base_url() -> String {
    "https://github.com/prometheus-community/ipmi_exporter/releases/download".to_string()
}

fn default_download_timeout() -> u64 {
    300
}

fn default_unit_name() -> String {
    "ipmi_exporter".to_string()
}

fn default_account() -> String {
    "ipmi_exporter".to_string()
}

fn default_dependency_package() -> String {
    "freeipmi".to_string()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_package_timeout() -> u64 {
    600
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/ipmi-exporter-operator/journal.log")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            config_file: default_config_file(),
            sysconfig: default_sysconfig(),
            state_dir: default_state_dir(),
            sudoers: default_sudoers(),
            unit_file: default_unit_file(),
            scratch_dir: default_scratch_dir(),
            templates_dir: None,
            lifecycle_state: default_lifecycle_state(),
            endpoint_file: default_endpoint_file(),
            dashboards_dir: default_dashboards_dir(),
            prometheus_rules_dir: default_prometheus_rules_dir(),
            loki_rules_dir: default_loki_rules_dir(),
        }
    }
}

impl PathsConfig {
    /// The textfile collector directory inside the state directory.
    pub fn textfile_dir(&self) -> PathBuf {
        self.state_dir.join("textfile_collector")
    }

    /// The exporter configuration directory.
    pub fn config_dir(&self) -> &Path {
        self.config_file.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Re-home every managed path under `root`, keeping its absolute layout.
    ///
    /// Used to stage a host layout inside a chroot or a scratch directory.
    pub fn under_root(&self, root: &Path) -> Self {
        let rebase = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        Self {
            binary: rebase(&self.binary),
            config_file: rebase(&self.config_file),
            sysconfig: rebase(&self.sysconfig),
            state_dir: rebase(&self.state_dir),
            sudoers: rebase(&self.sudoers),
            unit_file: rebase(&self.unit_file),
            scratch_dir: rebase(&self.scratch_dir),
            templates_dir: self.templates_dir.as_deref().map(rebase),
            lifecycle_state: rebase(&self.lifecycle_state),
            endpoint_file: rebase(&self.endpoint_file),
            dashboards_dir: rebase(&self.dashboards_dir),
            prometheus_rules_dir: rebase(&self.prometheus_rules_dir),
            loki_rules_dir: rebase(&self.loki_rules_dir),
        }
    }

    fn all(&self) -> Vec<(&'static str, &Path)> {
        let mut paths = vec![
            ("binary", self.binary.as_path()),
            ("config_file", self.config_file.as_path()),
            ("sysconfig", self.sysconfig.as_path()),
            ("state_dir", self.state_dir.as_path()),
            ("sudoers", self.sudoers.as_path()),
            ("unit_file", self.unit_file.as_path()),
            ("scratch_dir", self.scratch_dir.as_path()),
            ("lifecycle_state", self.lifecycle_state.as_path()),
            ("endpoint_file", self.endpoint_file.as_path()),
            ("dashboards_dir", self.dashboards_dir.as_path()),
            ("prometheus_rules_dir", self.prometheus_rules_dir.as_path()),
            ("loki_rules_dir", self.loki_rules_dir.as_path()),
        ];
        if let Some(dir) = &self.templates_dir {
            paths.push(("templates_dir", dir.as_path()));
        }
        paths
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_download_timeout(),
            architecture: None,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit_name: default_unit_name(),
            user: default_account(),
            group: default_account(),
            dependency_package: default_dependency_package(),
            command_timeout_seconds: default_command_timeout(),
            package_timeout_seconds: default_package_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout_seconds)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            ingress_address: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OperatorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| OperatorError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            OperatorError::Config { message } => OperatorError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, OperatorError> {
        let settings: Settings = toml::from_str(content).map_err(|e| OperatorError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), OperatorError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(OperatorError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(OperatorError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        for (name, path) in self.paths.all() {
            if !path.is_absolute() {
                return Err(OperatorError::Config {
                    message: format!("paths.{} must be absolute, got '{}'", name, path.display()),
                });
            }
        }

        validate_account_name(&self.service.user)?;
        validate_account_name(&self.service.group)?;

        if self.service.unit_name.is_empty()
            || !self
                .service
                .unit_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
        {
            return Err(OperatorError::Config {
                message: format!("Invalid unit name '{}'", self.service.unit_name),
            });
        }

        if !self.metrics.path.starts_with('/') {
            return Err(OperatorError::Config {
                message: format!("metrics.path must start with '/', got '{}'", self.metrics.path),
            });
        }

        if self.download.timeout_seconds == 0 {
            return Err(OperatorError::Config {
                message: "download.timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
