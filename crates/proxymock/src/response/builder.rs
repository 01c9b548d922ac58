use bytes::Bytes;
use http_body_util::Full;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::str::FromStr;

/// Assembles a buffered response. Invalid header names or values are skipped.
pub struct ResponseBuilder {
    status: StatusCode,
    body: Option<Bytes>,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status_code: StatusCode) -> Self {
        ResponseBuilder {
            status: status_code,
            body: None,
            headers: Default::default(),
        }
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                self
            }
            _ => self,
        }
    }

    /// Add a header without replacing earlier values of the same name.
    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn build_full(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
