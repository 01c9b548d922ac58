//! Backend side of the proxy.
//!
//! # Module Structure
//!
//! - `forwarding` - `Backend` trait, URL joining and the per-service `Forwarder`
//! - `client` - pooled HTTP client creation
//! - `headers` - restricted and hop-by-hop header handling, marker headers
//! - `tls` - certificate verifier for `TlsSkipVerify`
//! - `network` - listener sockets

mod client;
mod forwarding;
pub mod headers;
mod network;
mod tls;

use std::time::Duration;

use thiserror::Error;

pub use client::{create_http_client, HttpClient};
pub use forwarding::{backend_url, normalize_url, Backend, Forwarder, HttpBackend};
pub use headers::sanitize_headers;
pub use network::create_listener;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Invalid backend request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),
    #[error("Backend request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("Failed to read backend response: {0}")]
    Body(#[source] hyper::Error),
    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("TLS setup failed: {0}")]
    Tls(String),
}
