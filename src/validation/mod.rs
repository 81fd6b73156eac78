//! Input validation module.
//!
//! Provides validators for service account names, listen addresses, and
//! exporter release versions.

mod account;
mod listen_address;
mod version;

pub use account::validate_account_name;
pub use listen_address::{validate_listen_address, ListenAddress};
pub use version::validate_release_version;
