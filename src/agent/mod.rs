//! Boundaries towards the orchestration agent and metrics consumers.

mod endpoint;
mod status;

pub use endpoint::{EndpointPublisher, FileEndpointPublisher, PublishedEndpoint};
pub use status::{JsonStatusReporter, MemoryStatusReporter, StatusReporter, StatusUpdate, UnitStatus};
