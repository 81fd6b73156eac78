//! Host resource facade.
//!
//! Every side effect the operator has on the machine goes through this
//! module: process execution and HTTP downloads via the [`Host`] trait, file
//! placement via the idempotent helpers in [`fs`]. The lifecycle controller
//! depends only on the trait, so tests substitute a fake host.

mod facade;
mod fetch;
pub mod fs;

pub use facade::{Host, HostCommand, SystemHost};
pub use fetch::HttpFetcher;
