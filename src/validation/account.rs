//! Service account name validation.
//!
//! Validates user and group names before they are handed to groupadd,
//! useradd, userdel, and groupdel.

use crate::error::{OperatorError, ValidationErrorKind};

/// Maximum length for system account names (Linux standard).
const MAX_ACCOUNT_NAME_LENGTH: usize = 32;

/// Accounts the operator must never create or delete.
const RESERVED_ACCOUNTS: &[&str] = &[
    "root",
    "daemon",
    "bin",
    "sys",
    "sync",
    "games",
    "man",
    "lp",
    "mail",
    "news",
    "uucp",
    "proxy",
    "www-data",
    "backup",
    "list",
    "irc",
    "gnats",
    "nobody",
    "nogroup",
    "sudo",
    "adm",
    "wheel",
    "systemd-network",
    "systemd-resolve",
    "messagebus",
    "sshd",
    "_apt",
];

/// Validate a system user or group name.
///
/// Rules:
/// - Must not be empty or exceed 32 characters
/// - Must start with a lowercase letter
/// - May only contain lowercase letters, digits, underscores, and hyphens
/// - Must not be a reserved system account
pub fn validate_account_name(name: &str) -> Result<&str, OperatorError> {
    let invalid = |message: String| OperatorError::Validation {
        kind: ValidationErrorKind::InvalidAccountName {
            name: name.to_string(),
            message,
        },
    };

    let first = match name.chars().next() {
        Some(c) => c,
        None => return Err(invalid("Account name cannot be empty".to_string())),
    };

    if name.len() > MAX_ACCOUNT_NAME_LENGTH {
        return Err(invalid(format!(
            "Account name exceeds maximum length of {} characters",
            MAX_ACCOUNT_NAME_LENGTH
        )));
    }

    if !first.is_ascii_lowercase() {
        return Err(invalid(
            "Account name must start with a lowercase letter".to_string(),
        ));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '_' && *c != '-')
    {
        return Err(invalid(format!(
            "Account name contains invalid character '{}'",
            c
        )));
    }

    if RESERVED_ACCOUNTS.contains(&name) {
        return Err(invalid(format!("Account '{}' is reserved", name)));
    }

    Ok(name)
}
