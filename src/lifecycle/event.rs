//! Lifecycle events delivered by the orchestration agent.

use std::fmt;
use std::str::FromStr;

use crate::error::{OperatorError, OperatorResult, ValidationErrorKind};

/// A named lifecycle checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum LifecycleEvent {
    Install,
    UpgradeCharm,
    ConfigChanged,
    Start,
    Stop,
    /// A metrics consumer attached; republish the endpoint.
    MetricsRelationCreated,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::Install,
        LifecycleEvent::UpgradeCharm,
        LifecycleEvent::ConfigChanged,
        LifecycleEvent::Start,
        LifecycleEvent::Stop,
        LifecycleEvent::MetricsRelationCreated,
    ];

    /// Hook name as used by the orchestration agent.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Install => "install",
            LifecycleEvent::UpgradeCharm => "upgrade-charm",
            LifecycleEvent::ConfigChanged => "config-changed",
            LifecycleEvent::Start => "start",
            LifecycleEvent::Stop => "stop",
            LifecycleEvent::MetricsRelationCreated => "metrics-relation-created",
        }
    }

    /// Whether handling reads the exporter options bag.
    pub fn uses_options(&self) -> bool {
        matches!(self, LifecycleEvent::Install | LifecycleEvent::ConfigChanged)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifecycleEvent {
    type Err = OperatorError;

    /// Accepts hook names with either dashes or underscores.
    fn from_str(s: &str) -> OperatorResult<Self> {
        let normalized = s.trim().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|event| event.name() == normalized)
            .ok_or_else(|| OperatorError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "event".to_string(),
                    message: format!("unknown lifecycle event '{}'", s),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_names_round_trip() {
        for event in LifecycleEvent::ALL {
            assert_eq!(event.name().parse::<LifecycleEvent>().unwrap(), event);
        }
        assert_eq!(
            "config_changed".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::ConfigChanged
        );
        assert!("update-status".parse::<LifecycleEvent>().is_err());
    }

    #[test]
    fn test_cli_names_match_hook_names() {
        for event in LifecycleEvent::ALL {
            let value = event.to_possible_value().unwrap();
            assert_eq!(value.get_name(), event.name());
        }
    }
}
