//! Response construction.
//!
//! # Module Structure
//!
//! - `builder` - buffered response builder
//! - `synthesizer` - mocked responses from catalog entries

mod builder;
mod synthesizer;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

pub use builder::ResponseBuilder;
pub use synthesizer::{content_type_for, substitute_variables, synthesize};

/// JSON error body `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    ResponseBuilder::new(status)
        .header("content-type", "application/json")
        .body(body)
        .build_full()
}
