//! One listener per configured service.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::handler::ServiceHandler;
use super::types::{ServiceError, ServiceState, ServiceStatus};
use crate::config::{Config, ServiceConfig};
use crate::proxy::{create_http_client, create_listener, Backend, HttpBackend};
use crate::storage::{FileStore, LocalFileStore};

struct ServiceSlot {
    status: Arc<RwLock<ServiceStatus>>,
    task: Option<JoinHandle<()>>,
}

/// Starts, tracks and stops the listeners of every configured service.
///
/// Services are independent: one that cannot bind is marked `Failed` and
/// the others keep serving.
pub struct ServiceCoordinator {
    config: Arc<Config>,
    store: Arc<dyn FileStore>,
    backend: Arc<dyn Backend>,
    services: RwLock<Vec<ServiceSlot>>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl ServiceCoordinator {
    /// Coordinator using the local file system and a pooled HTTP(S) backend client.
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let client = create_http_client(&config.connection_pool, config.tls_skip_verify)?;
        let backend = Arc::new(HttpBackend::new(
            client,
            config.connection_pool.request_timeout(),
        ));
        Ok(Self::with_backend(config, Arc::new(LocalFileStore), backend))
    }

    pub fn with_backend(
        config: Config,
        store: Arc<dyn FileStore>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let services = config
            .services
            .iter()
            .map(|service| ServiceSlot {
                status: Arc::new(RwLock::new(ServiceStatus::new(service.name.clone()))),
                task: None,
            })
            .collect();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            store,
            backend,
            services: RwLock::new(services),
            shutdown_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Bind every service concurrently. Returns how many are listening.
    pub async fn start(&self) -> Result<usize, ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        let statuses: Vec<_> = self
            .services
            .read()
            .iter()
            .map(|slot| Arc::clone(&slot.status))
            .collect();

        let starts = self
            .config
            .services
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(index, (service, status))| async move {
                let result = self.start_service(index, service, &status).await;
                if let Err(e) = &result {
                    let mut status = status.write();
                    status.state = ServiceState::Failed;
                    status.error = Some(e.to_string());
                }
                result
            });
        let results = futures::future::join_all(starts).await;

        let mut listening = 0;
        let mut services = self.services.write();
        for ((slot, service), result) in services
            .iter_mut()
            .zip(&self.config.services)
            .zip(results)
        {
            match result {
                Ok(task) => {
                    slot.task = Some(task);
                    listening += 1;
                }
                Err(e) => error!("Service '{}' is not available: {}", service.name, e),
            }
        }

        info!(
            "{} of {} services listening",
            listening,
            self.config.services.len()
        );
        Ok(listening)
    }

    async fn start_service(
        &self,
        index: usize,
        service: &ServiceConfig,
        status: &Arc<RwLock<ServiceStatus>>,
    ) -> Result<JoinHandle<()>, ServiceError> {
        let port = self
            .config
            .port_for(index)
            .ok_or_else(|| ServiceError::NoPort(service.name.clone()))?;
        let listener = self.bind_with_retry(&service.name, port, status).await?;
        let address = listener
            .local_addr()
            .map_err(|source| ServiceError::Bind {
                name: service.name.clone(),
                port,
                source,
            })?;

        {
            let mut status = status.write();
            status.state = ServiceState::Listening;
            status.address = Some(address);
            status.error = None;
        }
        info!(
            "Service '{}' listening on {} (backend {})",
            service.name, address, service.url
        );

        let handler = Arc::new(ServiceHandler::from_config(
            service,
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
        ));

        Ok(tokio::spawn(serve(
            listener,
            handler,
            self.shutdown_tx.subscribe(),
            self.config.shutdown_grace(),
            Arc::clone(status),
        )))
    }

    /// Bind `port`, retrying only while it is in use.
    async fn bind_with_retry(
        &self,
        name: &str,
        port: u16,
        status: &RwLock<ServiceStatus>,
    ) -> Result<TcpListener, ServiceError> {
        let addr = resolve(&self.config.listen_host, port).await?;
        let limit = self.config.handler_retry_limit;
        let delay = self.config.bind_retry_delay();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            {
                let mut status = status.write();
                status.state = ServiceState::Binding;
                status.attempts = attempt;
            }

            match create_listener(addr) {
                Ok(listener) => return Ok(listener),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempt <= limit => {
                    status.write().state = ServiceState::RetryWait;
                    warn!(
                        "Port {} for service '{}' is in use, retrying in {}ms ({}/{})",
                        port,
                        name,
                        delay.as_millis(),
                        attempt,
                        limit
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(ServiceError::Bind {
                        name: name.to_string(),
                        port,
                        source,
                    })
                }
            }
        }
    }

    /// Snapshot of every service's state, in configuration order.
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        self.services
            .read()
            .iter()
            .map(|slot| slot.status.read().clone())
            .collect()
    }

    /// Bound address of a listening service
    pub fn address_of(&self, name: &str) -> Option<SocketAddr> {
        self.statuses()
            .into_iter()
            .find(|s| s.name == name && s.state == ServiceState::Listening)
            .and_then(|s| s.address)
    }

    /// Stop accepting, let in-flight requests finish within the grace period, then abort.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let tasks: Vec<JoinHandle<()>> = self
            .services
            .write()
            .iter_mut()
            .filter_map(|slot| slot.task.take())
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Service task ended abnormally: {}", e);
            }
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ServiceError> {
    tokio::net::lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServiceError::Address(format!("{host}:{port}")))
}

async fn serve(
    listener: TcpListener,
    handler: Arc<ServiceHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
    status: Arc<RwLock<ServiceStatus>>,
) {
    let name = handler.name().to_string();
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let io = TokioIo::new(stream);
                        let handler = Arc::clone(&handler);
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { Ok::<_, Infallible>(handler.handle(req).await) }
                        });
                        let connection = graceful.watch(http1::Builder::new().serve_connection(io, service));
                        let name = name.clone();
                        connections.spawn(async move {
                            if let Err(e) = connection.await {
                                debug!("Connection error from {} on service '{}': {}", peer, name, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on service '{}': {}", name, e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown_rx.wait_for(|stop| *stop) => {
                info!("Service '{}' shutting down", name);
                break;
            }
        }
    }
    drop(listener);

    tokio::select! {
        _ = graceful.shutdown() => {
            debug!("All connections of service '{}' closed", name);
        }
        _ = tokio::time::sleep(grace) => {
            warn!(
                "Grace period of {:?} elapsed for service '{}', aborting {} connections",
                grace,
                name,
                connections.len()
            );
        }
    }
    connections.shutdown().await;

    status.write().state = ServiceState::Stopped;
}
