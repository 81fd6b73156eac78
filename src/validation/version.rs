//! Exporter release version validation.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{OperatorError, ValidationErrorKind};

fn release_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+(-[0-9A-Za-z.]+)?$").expect("static regex is valid")
    })
}

/// Validate a release version as used in download URLs (`1.9.0`, `1.10.0-rc.1`).
///
/// A leading `v` is accepted and stripped, since release tags carry it.
pub fn validate_release_version(version: &str) -> Result<String, OperatorError> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);

    if !release_pattern().is_match(version) {
        return Err(OperatorError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: "exporter-version".to_string(),
                message: format!("'{}' is not a release version like 1.9.0", version),
            },
        });
    }

    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_versions() {
        assert_eq!(validate_release_version("1.9.0").unwrap(), "1.9.0");
        assert_eq!(validate_release_version("v1.8.0").unwrap(), "1.8.0");
        assert_eq!(validate_release_version("1.10.0-rc.1").unwrap(), "1.10.0-rc.1");
    }

    #[test]
    fn test_invalid_versions() {
        assert!(validate_release_version("").is_err());
        assert!(validate_release_version("1.9").is_err());
        assert!(validate_release_version("latest").is_err());
        assert!(validate_release_version("1.9.0/../../evil").is_err());
    }
}
