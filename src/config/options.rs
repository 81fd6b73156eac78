//! Per-event exporter options supplied by the orchestration agent.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OperatorError, OperatorResult, ValidationErrorKind};
use crate::validation::{validate_listen_address, validate_release_version, ListenAddress};

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9290";
const DEFAULT_EXPORTER_VERSION: &str = "1.9.0";

/// CPU architecture names as they appear in release archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
    Armv5,
    Armv6,
    Armv7,
    #[serde(rename = "386")]
    I386,
    Ppc64le,
    S390x,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
            Architecture::Armv5 => "armv5",
            Architecture::Armv6 => "armv6",
            Architecture::Armv7 => "armv7",
            Architecture::I386 => "386",
            Architecture::Ppc64le => "ppc64le",
            Architecture::S390x => "s390x",
        }
    }

    /// Architecture of the running host, if a release is published for it.
    pub fn detect() -> OperatorResult<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Architecture::Amd64),
            "aarch64" => Ok(Architecture::Arm64),
            "arm" => Ok(Architecture::Armv7),
            "x86" => Ok(Architecture::I386),
            "powerpc64" => Ok(Architecture::Ppc64le),
            "s390x" => Ok(Architecture::S390x),
            other => Err(OperatorError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "architecture".to_string(),
                    message: format!("no exporter release for host architecture '{}'", other),
                },
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Architecture::Amd64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            "armv5" => Ok(Architecture::Armv5),
            "armv6" => Ok(Architecture::Armv6),
            "armv7" => Ok(Architecture::Armv7),
            "386" | "i386" => Ok(Architecture::I386),
            "ppc64le" => Ok(Architecture::Ppc64le),
            "s390x" => Ok(Architecture::S390x),
            _ => Err(OperatorError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "architecture".to_string(),
                    message: format!("unsupported architecture '{}'", s),
                },
            }),
        }
    }
}

/// Raw key/value bag as delivered by the agent.
///
/// Keys use the agent's kebab-case names. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExporterOptions {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_exporter_version")]
    pub exporter_version: String,
    #[serde(default)]
    pub architecture: Option<String>,
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_exporter_version() -> String {
    DEFAULT_EXPORTER_VERSION.to_string()
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            exporter_version: default_exporter_version(),
            architecture: None,
        }
    }
}

impl ExporterOptions {
    /// Read an options bag from a JSON file.
    pub fn from_file(path: &Path) -> OperatorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OperatorError::Config {
            message: format!("Failed to read options file '{}': {}", path.display(), e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Set a single option by its agent key.
    pub fn set(&mut self, key: &str, value: &str) -> OperatorResult<()> {
        match key {
            "listen-address" => self.listen_address = value.to_string(),
            "exporter-version" => self.exporter_version = value.to_string(),
            "architecture" => self.architecture = Some(value.to_string()),
            _ => {
                return Err(OperatorError::Validation {
                    kind: ValidationErrorKind::UnknownOption {
                        key: key.to_string(),
                    },
                })
            }
        }
        Ok(())
    }

    /// Apply a `key=value` assignment.
    pub fn apply_assignment(&mut self, assignment: &str) -> OperatorResult<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| OperatorError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: assignment.to_string(),
                message: "expected key=value".to_string(),
            },
        })?;
        self.set(key.trim(), value.trim())
    }

    /// Validate the bag into a typed config.
    ///
    /// `fallback_arch` is used when the bag carries no architecture.
    pub fn into_config(self, fallback_arch: Option<Architecture>) -> OperatorResult<ExporterConfig> {
        let listen_address = validate_listen_address(&self.listen_address)?;
        let version = validate_release_version(&self.exporter_version)?;
        let architecture = match self.architecture {
            Some(arch) => arch.parse()?,
            None => match fallback_arch {
                Some(arch) => arch,
                None => Architecture::detect()?,
            },
        };

        Ok(ExporterConfig {
            version,
            architecture,
            listen_address,
        })
    }
}

/// Validated exporter configuration for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    pub version: String,
    pub architecture: Architecture,
    pub listen_address: ListenAddress,
}
