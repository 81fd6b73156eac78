//! Error types for the exporter operator.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
