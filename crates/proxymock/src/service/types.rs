//! Service lifecycle states and errors.

use std::io;
use std::net::SocketAddr;

use serde::Serialize;
use thiserror::Error;

use crate::proxy::ForwardError;

/// Lifecycle of one service listener.
///
/// `Created -> Binding -> Listening -> Stopped`, or
/// `Binding -> RetryWait -> Binding ... -> Failed` while the port is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    Created,
    Binding,
    RetryWait,
    Listening,
    Failed,
    Stopped,
}

/// Point-in-time view of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// Bound address once listening
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<SocketAddr>,
    /// Bind attempts made so far
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ServiceState::Created,
            address: None,
            attempts: 0,
            error: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to bind port {port} for service '{name}': {source}")]
    Bind {
        name: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("No port available for service '{0}' (BasePort + index overflows)")]
    NoPort(String),
    #[error("Cannot resolve listen address {0}")]
    Address(String),
    #[error("Backend client setup failed: {0}")]
    Client(#[from] ForwardError),
    #[error("Services are already started")]
    AlreadyStarted,
}
