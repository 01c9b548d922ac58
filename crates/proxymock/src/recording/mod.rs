//! Capture of real backend exchanges.
//!
//! Every forwarded request that got an answer is written as pretty JSON to
//! `<LogDirectory>/<service>/<token>_<yyyy-MM-dd_HH-mm-ss-fff>[_<n>].json`,
//! where the token is the request body's `call` value. Captures are never
//! read back by the proxy; they are raw material for new mock files.
//!
//! # Module Structure
//!
//! - `types` - `CapturedExchange` file format
//! - `store` - `Recorder` and file naming

mod store;
mod types;

pub use store::{file_stem, sanitize_token, RecordError, Recorder};
pub use types::{headers_to_map, CapturedExchange, CapturedResponse};
