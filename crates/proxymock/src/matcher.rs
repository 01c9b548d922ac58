//! Selection of the mock entry that answers a request.
//!
//! Entries are tried in catalog order and the first one whose endpoint and
//! required parameters all hold wins. There is no specificity ranking, so an
//! entry listed after a broader one with the same endpoint is never reached;
//! `proxymock-lint` reports those.

use crate::catalog::{CatalogSnapshot, MockEntry};
use crate::extractor;

/// Endpoint key for a request path. The root path maps to the empty endpoint.
pub fn normalize_endpoint(path: &str) -> &str {
    if path == "/" {
        ""
    } else {
        path
    }
}

/// True when every required parameter of `entry` is present in `body` with its value.
pub fn params_satisfied(entry: &MockEntry, body: &str) -> bool {
    entry
        .required_params
        .iter()
        .all(|(key, expected)| extractor::contains(body, key, expected))
}

/// First entry of `snapshot` answering `path` with `body`.
pub fn match_request<'a>(
    snapshot: &'a CatalogSnapshot,
    path: &str,
    body: &str,
) -> Option<&'a MockEntry> {
    let endpoint = normalize_endpoint(path);
    snapshot
        .entries
        .iter()
        .filter(|entry| entry.endpoint == endpoint)
        .find(|entry| params_satisfied(entry, body))
}
