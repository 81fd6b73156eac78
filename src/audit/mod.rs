//! Lifecycle journal.
//!
//! Every handled lifecycle event is appended to a JSON lines file: which
//! event ran, the phase it started and ended in, how it ended, and how long
//! it took.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditResult};
pub use logger::AuditLogger;
