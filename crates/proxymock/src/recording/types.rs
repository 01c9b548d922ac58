//! Captured exchange file format.

use std::collections::BTreeMap;

use hyper::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

/// One real backend round trip as written to the capture directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapturedExchange {
    /// Backend URL the request went to
    pub endpoint: String,
    pub body: String,
    /// Headers sent to the backend
    pub headers: BTreeMap<String, String>,
    pub response: CapturedResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapturedResponse {
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub status_code: u16,
}

/// Header map flattened to text; the first value of a repeated name wins.
pub fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

impl CapturedExchange {
    pub fn new(
        endpoint: impl Into<String>,
        request_body: &[u8],
        request_headers: &HeaderMap,
        status: StatusCode,
        response_headers: &HeaderMap,
        response_body: &[u8],
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            body: String::from_utf8_lossy(request_body).into_owned(),
            headers: headers_to_map(request_headers),
            response: CapturedResponse {
                body: String::from_utf8_lossy(response_body).into_owned(),
                headers: headers_to_map(response_headers),
                status_code: status.as_u16(),
            },
        }
    }
}
