//! Command executor module.
//!
//! Handles safe subprocess spawning, execution timeouts, and output trimming.

mod output;
mod subprocess;

pub use output::sanitize_output;
pub use subprocess::{SubprocessBuilder, SubprocessResult};
