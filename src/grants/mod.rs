//! Privilege grant management.
//!
//! Writes the sudoers rule that lets the service account run the IPMI helper
//! tools, and nothing else.

mod rule;

pub use rule::{render_grant, GrantManager, HELPER_COMMANDS};
