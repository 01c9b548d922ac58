//! Header names and header rewriting for forwarded traffic.

use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;

pub static X_PROXYMOCK_MOCKED: HeaderName = HeaderName::from_static("x-proxymock-mocked");
pub static X_PROXYMOCK_BACKEND_ERROR: HeaderName =
    HeaderName::from_static("x-proxymock-backend-error");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");

/// Fragments of header names that are never sent to a backend.
const RESTRICTED_FRAGMENTS: [&str; 3] = ["postman", "host", "accept-encoding"];

/// Connection-level headers that must not be relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_restricted(name: &HeaderName) -> bool {
    let name = name.as_str();
    RESTRICTED_FRAGMENTS.iter().any(|f| name.contains(f))
}

/// Copy of `headers` without the restricted ones.
pub fn sanitize_headers(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_restricted(name) {
            sanitized.append(name.clone(), value.clone());
        }
    }
    sanitized
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
