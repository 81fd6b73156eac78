//! Persisted lifecycle phase.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OperatorError, OperatorResult};
use crate::host::fs;

use super::event::LifecycleEvent;

/// Phase of the exporter on this host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecyclePhase {
    #[default]
    Uninstalled,
    Installing,
    Active,
    Restarting,
    Stopping,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Uninstalled => "uninstalled",
            LifecyclePhase::Installing => "installing",
            LifecyclePhase::Active => "active",
            LifecyclePhase::Restarting => "restarting",
            LifecyclePhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Reject `event` unless it may run from `phase`.
///
/// `Installing` and `Restarting` are only ever observed after an
/// interrupted or failed event, and accept a retry of that same event.
pub fn check_transition(phase: LifecyclePhase, event: LifecycleEvent) -> OperatorResult<()> {
    use LifecycleEvent as E;
    use LifecyclePhase as P;

    let allowed = match event {
        E::Install => matches!(phase, P::Uninstalled | P::Installing),
        E::ConfigChanged => matches!(phase, P::Active | P::Restarting),
        E::UpgradeCharm | E::Start | E::MetricsRelationCreated => phase == P::Active,
        E::Stop => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(OperatorError::InvalidTransition {
            event: event.to_string(),
            phase: phase.to_string(),
        })
    }
}

/// What the operator remembers between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleState {
    pub phase: LifecyclePhase,
    #[serde(default)]
    pub workload_version: Option<String>,
    #[serde(default)]
    pub listen_address: Option<String>,
    #[serde(default)]
    pub exporter_version: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Loads and atomically saves [`LifecycleState`].
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Load the state. A missing file means nothing was ever installed.
    pub fn load(&self) -> OperatorResult<LifecycleState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LifecycleState::default()),
            Err(e) => Err(OperatorError::install_io(&self.path, e)),
        }
    }

    /// Stamp and persist the state.
    pub fn save(&self, state: &mut LifecycleState) -> OperatorResult<()> {
        state.updated_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let json = serde_json::to_vec_pretty(state)?;
        fs::write_atomic(&self.path, &json, 0o644)?;
        debug!(phase = %state.phase, path = %self.path.display(), "Lifecycle state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_state_is_uninstalled() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(&dir.path().join("state.json"));
        assert_eq!(store.load().unwrap().phase, LifecyclePhase::Uninstalled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(&dir.path().join("nested/state.json"));
        let mut state = LifecycleState {
            phase: LifecyclePhase::Active,
            workload_version: Some("1.9.0".to_string()),
            listen_address: Some("0.0.0.0:9290".to_string()),
            exporter_version: Some("1.9.0".to_string()),
            updated_at: None,
        };

        store.save(&mut state).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, state);
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn test_transitions() {
        use LifecycleEvent as E;
        use LifecyclePhase as P;

        assert!(check_transition(P::Uninstalled, E::Install).is_ok());
        assert!(check_transition(P::Installing, E::Install).is_ok());
        assert!(check_transition(P::Active, E::Install).is_err());
        assert!(check_transition(P::Uninstalled, E::Start).is_err());
        assert!(check_transition(P::Uninstalled, E::ConfigChanged).is_err());
        assert!(check_transition(P::Restarting, E::ConfigChanged).is_ok());
        assert!(check_transition(P::Restarting, E::Start).is_err());
        assert!(check_transition(P::Active, E::MetricsRelationCreated).is_ok());
        for phase in [P::Uninstalled, P::Installing, P::Active, P::Restarting, P::Stopping] {
            assert!(check_transition(phase, E::Stop).is_ok());
        }
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = check_transition(LifecyclePhase::Active, LifecycleEvent::Install).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Event 'install' is not allowed while active");
    }
}
