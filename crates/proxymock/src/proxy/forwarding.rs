//! Request forwarding to the real backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::http::request;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error};

use super::client::HttpClient;
use super::headers::{sanitize_headers, strip_hop_by_hop, VALUE_TRUE, X_PROXYMOCK_BACKEND_ERROR};
use super::ForwardError;
use crate::recording::{CapturedExchange, Recorder};
use crate::response::error_response;

/// Anything that can deliver a request to a backend and buffer its answer.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Bytes>, ForwardError>;
}

/// Backend reached over HTTP(S) through the shared pooled client.
pub struct HttpBackend {
    client: HttpClient,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Bytes>, ForwardError> {
        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await.map_err(ForwardError::Body)?.to_bytes();
            Ok::<_, ForwardError>(Response::from_parts(parts, body))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
    }
}

/// Collapse `//` runs in the path, turn back-slashes into slashes and repair
/// a single-slash scheme separator (`http:/host`). The query is left alone.
pub fn normalize_url(url: &str) -> String {
    let (target, query) = match url.split_once('?') {
        Some((target, query)) => (target, Some(query)),
        None => (url, None),
    };
    let target = target.replace('\\', "/");

    let (scheme, rest) = match target.split_once(":/") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            (Some(scheme), rest.trim_start_matches('/'))
        }
        _ => (None, target.as_str()),
    };

    let mut normalized = String::with_capacity(url.len() + 1);
    if let Some(scheme) = scheme {
        normalized.push_str(scheme);
        normalized.push_str("://");
    }
    let mut previous_slash = false;
    for c in rest.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        normalized.push(c);
    }

    if let Some(query) = query {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

/// Backend URL for an inbound path and query.
pub fn backend_url(base: &str, path_and_query: &str) -> String {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches(['/', '\\']),
        path_and_query.trim_start_matches(['/', '\\'])
    );
    normalize_url(&joined)
}

/// Forwards unmatched requests of one service and records what came back.
pub struct Forwarder {
    service: String,
    base_url: String,
    backend: Arc<dyn Backend>,
    recorder: Arc<Recorder>,
}

impl Forwarder {
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        backend: Arc<dyn Backend>,
        recorder: Arc<Recorder>,
    ) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.into(),
            backend,
            recorder,
        }
    }

    /// Send the request to the backend and relay its response.
    ///
    /// Transport failures and timeouts become `502 Bad Gateway` with the
    /// `x-proxymock-backend-error` marker; nothing is recorded for them.
    pub async fn forward(&self, parts: &request::Parts, body: Bytes) -> Response<Full<Bytes>> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = backend_url(&self.base_url, path_and_query);

        let mut headers = sanitize_headers(&parts.headers);
        strip_hop_by_hop(&mut headers);

        debug!("Forwarding {} {} to {}", parts.method, parts.uri, url);

        let start = Instant::now();
        let outcome = match build_request(&parts.method, &url, &headers, body.clone()) {
            Ok(request) => self.backend.send(request).await,
            Err(e) => Err(e),
        };
        let elapsed_ms = start.elapsed().as_millis();

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Backend call for service '{}' to {} failed after {}ms: {}",
                    self.service, url, elapsed_ms, e
                );
                let mut response = error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
                response
                    .headers_mut()
                    .insert(X_PROXYMOCK_BACKEND_ERROR.clone(), VALUE_TRUE.clone());
                return response;
            }
        };

        let (mut response_parts, response_body) = response.into_parts();
        strip_hop_by_hop(&mut response_parts.headers);

        debug!(
            "Backend answered {} for {} in {}ms",
            response_parts.status, url, elapsed_ms
        );

        let exchange = CapturedExchange::new(
            url,
            &body,
            &headers,
            response_parts.status,
            &response_parts.headers,
            &response_body,
        );
        self.recorder.record(&exchange).await;

        Response::from_parts(response_parts, Full::new(response_body))
    }
}

fn build_request(
    method: &hyper::Method,
    url: &str,
    headers: &hyper::HeaderMap,
    body: Bytes,
) -> Result<Request<Full<Bytes>>, ForwardError> {
    let mut request = Request::builder()
        .method(method.clone())
        .uri(url)
        .body(Full::new(body))?;
    request.headers_mut().extend(headers.clone());
    Ok(request)
}
