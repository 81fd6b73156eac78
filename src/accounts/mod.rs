//! Service account management.
//!
//! Creates and removes the unprivileged user and group the exporter runs as.

mod principal;

pub use principal::{AccountManager, ServiceAccount};
