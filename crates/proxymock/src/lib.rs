//! proxymock: a per-service reverse proxy that answers from mock files.
//!
//! Every configured backend service gets its own listener. A request is
//! first matched against the service's mock catalog (`MockedRequests/<service>*.json`);
//! on a hit the mocked response is synthesized, otherwise the request goes to
//! the real backend and the exchange is captured under `Logs/<service>/`.
//!
//! # Module Structure
//!
//! - `config` - YAML configuration
//! - `storage` - file access used by the catalog and the recorder
//! - `extractor` - key lookup in JSON and XML bodies
//! - `catalog` - hot-reloaded mock definitions
//! - `matcher` - first-match selection of a mock entry
//! - `response` - mocked response synthesis and error responses
//! - `proxy` - backend client, header sanitizing and forwarding
//! - `recording` - captured exchange files
//! - `service` - per-service handlers and the listener coordinator
//! - `logging` - tracing subscriber setup

pub mod catalog;
pub mod config;
pub mod extractor;
pub mod logging;
pub mod matcher;
pub mod proxy;
pub mod recording;
pub mod response;
pub mod service;
pub mod storage;

pub use config::{Config, ServiceConfig};
pub use service::{ServiceCoordinator, ServiceState, ServiceStatus};
