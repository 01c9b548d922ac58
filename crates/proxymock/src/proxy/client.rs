//! HTTP client creation and configuration.
//!
//! One pooled client is shared by every service; it speaks HTTP/1.1 over
//! plain TCP or rustls.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{info, warn};

use super::tls::{install_crypto_provider, NoVerifier};
use super::ForwardError;
use crate::config::ConnectionPoolConfig;

/// Type alias for the HTTP client used to reach backends.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Create the shared HTTP client with connection pooling.
///
/// With `skip_tls_verify` every backend certificate is accepted; otherwise
/// the platform's native roots are trusted.
pub fn create_http_client(
    pool: &ConnectionPoolConfig,
    skip_tls_verify: bool,
) -> Result<HttpClient, ForwardError> {
    install_crypto_provider();

    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false);

    let https_connector = if skip_tls_verify {
        warn!("TLS certificate verification DISABLED for backend connections (TlsSkipVerify)");
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(
                rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoVerifier))
                    .with_no_client_auth(),
            )
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector)
    } else {
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| ForwardError::Tls(format!("Failed to load native root certificates: {e}")))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector)
    };

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s, request_timeout={}s",
        pool.max_idle_per_host,
        pool.idle_timeout_secs,
        pool.keepalive_timeout_secs,
        pool.request_timeout_secs
    );

    Ok(http_client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_client_skip_verify() {
        let pool = ConnectionPoolConfig::default();
        assert!(create_http_client(&pool, true).is_ok());
    }
}
