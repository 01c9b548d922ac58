//! Request handling for one service.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use tracing::{info, info_span, warn, Instrument};

use crate::catalog::MockCatalog;
use crate::config::{Config, ServiceConfig};
use crate::extractor::BodyInspector;
use crate::matcher::match_request;
use crate::proxy::{Backend, Forwarder};
use crate::recording::Recorder;
use crate::response::{error_response, synthesize};
use crate::storage::FileStore;

/// Answers the requests of one service: mock hit or backend round trip.
pub struct ServiceHandler {
    name: String,
    catalog: MockCatalog,
    forwarder: Forwarder,
    inspector: BodyInspector,
}

impl ServiceHandler {
    pub fn new(name: impl Into<String>, catalog: MockCatalog, forwarder: Forwarder) -> Self {
        Self {
            name: name.into(),
            catalog,
            forwarder,
            inspector: BodyInspector::default(),
        }
    }

    pub fn with_inspector(mut self, inspector: BodyInspector) -> Self {
        self.inspector = inspector;
        self
    }

    /// Wire catalog, recorder and forwarder for `service`.
    pub fn from_config(
        service: &ServiceConfig,
        config: &Config,
        store: Arc<dyn FileStore>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let inspector = BodyInspector::new(config.max_inspected_body_bytes);
        let catalog = MockCatalog::new(
            service.name.clone(),
            config.mock_directory.clone(),
            config.use_file_cache,
            Arc::clone(&store),
        );
        let recorder = Arc::new(
            Recorder::new(service.name.clone(), &config.log_directory, store)
                .with_inspector(inspector),
        );
        let forwarder = Forwarder::new(service.name.clone(), service.url.clone(), backend, recorder);
        Self::new(service.name.clone(), catalog, forwarder).with_inspector(inspector)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let span = info_span!(
            "request",
            service = %self.name,
            method = %request.method(),
            path = %request.uri().path(),
        );
        self.handle_inner(request).instrument(span).await
    }

    async fn handle_inner<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let snapshot = self.catalog.load().await;
        let hit = {
            let snapshot = Arc::clone(&snapshot);
            let path = parts.uri.path().to_string();
            self.inspector
                .inspect(body.clone(), move |text| {
                    match_request(&snapshot, &path, text).cloned()
                })
                .await
        };
        if let Some(entry) = hit {
            info!(
                "Mock hit from {} ({} entries in catalog)",
                entry.source.display(),
                snapshot.len()
            );
            return synthesize(&entry);
        }

        info!("No mock matched, forwarding to backend");
        self.forwarder.forward(&parts, body).await
    }
}
