//! Listen address parsing.
//!
//! The exporter's `listen-address` option must always split into a host and
//! a numeric, non-zero port. IPv6 hosts are written in brackets
//! (`[::1]:9290`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OperatorError, ValidationErrorKind};

/// A validated `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenAddress {
    host: String,
    port: u16,
}

impl ListenAddress {
    /// The host part, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the host binds every interface (`0.0.0.0`, `::`, or empty).
    pub fn is_unspecified(&self) -> bool {
        matches!(self.host.as_str(), "0.0.0.0" | "::" | "")
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenAddress {
    type Err = OperatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        validate_listen_address(value)
    }
}

impl TryFrom<String> for ListenAddress {
    type Error = OperatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_listen_address(&value)
    }
}

impl From<ListenAddress> for String {
    fn from(value: ListenAddress) -> Self {
        value.to_string()
    }
}

/// Parse and validate a `host:port` listen address.
pub fn validate_listen_address(value: &str) -> Result<ListenAddress, OperatorError> {
    let invalid = |message: &str| OperatorError::Validation {
        kind: ValidationErrorKind::InvalidListenAddress {
            value: value.to_string(),
            message: message.to_string(),
        },
    };

    let trimmed = value.trim();
    let (host, port) = trimmed
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;

    let host = if let Some(inner) = host.strip_prefix('[') {
        inner
            .strip_suffix(']')
            .ok_or_else(|| invalid("unterminated IPv6 bracket"))?
    } else if host.contains(':') {
        return Err(invalid("IPv6 hosts must be enclosed in brackets"));
    } else {
        host
    };

    if host.is_empty() {
        return Err(invalid("host cannot be empty"));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'))
    {
        return Err(invalid("host contains invalid characters"));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
    if port == 0 {
        return Err(invalid("port must be a number between 1 and 65535"));
    }

    Ok(ListenAddress {
        host: host.to_string(),
        port,
    })
}
