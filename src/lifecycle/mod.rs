//! Lifecycle controller.
//!
//! Maps each lifecycle event onto an ordered sequence of idempotent
//! provisioning steps, persists the resulting phase, and reports status and
//! version to the orchestration agent.

mod controller;
mod event;
mod state;
mod steps;
mod version;

pub use controller::LifecycleController;
pub use event::LifecycleEvent;
pub use state::{check_transition, LifecyclePhase, LifecycleState, StateStore};
pub use steps::{ProvisionStep, INSTALL_SEQUENCE, TEARDOWN_SEQUENCE};
pub use version::{parse_version, query_version};
