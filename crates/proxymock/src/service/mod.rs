//! Per-service listeners and request dispatch.
//!
//! # Module Structure
//!
//! - `handler` - `ServiceHandler`: catalog lookup, synthesis or forwarding
//! - `coordinator` - `ServiceCoordinator`: binding with retry, lifecycle, shutdown
//! - `types` - lifecycle states, status snapshots and errors

mod coordinator;
mod handler;
mod types;

pub use coordinator::ServiceCoordinator;
pub use handler::ServiceHandler;
pub use types::{ServiceError, ServiceState, ServiceStatus};
