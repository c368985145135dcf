//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Perform the initial, synchronous registry load
//! - Start the reload worker and its triggers
//! - Bind listeners and begin accepting traffic
//! - Drain connections on shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, including an unreadable
//!   descriptor directory
//! - Listeners start last (traffic only when the registry is ready)
//! - Shutdown has a deadline: connections still open after it are abandoned

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::watcher::DirectoryWatcher;
use crate::config::{GatewayConfig, HttpMode};
use crate::http::redirect::serve_redirect;
use crate::http::{GatewayServer, HeadLimits};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{wait_for_shutdown_signal, SignalTrigger};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::net::tls::{load_tls_acceptor, TlsError};
use crate::observability::init_metrics;
use crate::registry::{DescriptorLoader, LoadError, RegistrySwitch};
use crate::reload::{IntervalTrigger, ReloadHandle, ReloadTrigger, ReloadWorker};
use crate::routing::Router;
use crate::tunnel::TunnelProxy;

/// How long stopped tasks get to finish after the shutdown broadcast.
const TASK_STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("initial descriptor load failed: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// A running gateway.
pub struct Gateway {
    registry: Arc<RegistrySwitch>,
    reload: ReloadHandle,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    drain_timeout: Duration,
    https_addr: SocketAddr,
    http_addr: Option<SocketAddr>,
    admin_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    /// Bring every subsystem up. Returns once all listeners are bound.
    pub async fn start(config: GatewayConfig) -> Result<Self, StartupError> {
        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
            init_metrics(addr)?;
        }

        let loader = Arc::new(DescriptorLoader::from_config(&config.apps));
        let initial = loader.load(&config.apps.dir)?;
        tracing::info!(
            backends = initial.len(),
            skipped = initial.skipped(),
            generation = initial.generation(),
            "Initial registry loaded"
        );
        let registry = Arc::new(RegistrySwitch::new(initial));

        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        let (worker, reload) =
            ReloadWorker::new(Arc::clone(&loader), config.apps.dir.clone(), Arc::clone(&registry));
        tasks.push(tokio::spawn(worker.run(shutdown.subscribe())));

        tasks.push(start_trigger(SignalTrigger::new(), &reload, &shutdown));
        if config.apps.watch {
            let watcher = DirectoryWatcher::new(&config.apps.dir, loader.extension());
            tasks.push(start_trigger(watcher, &reload, &shutdown));
        }
        if config.apps.reload_interval_secs > 0 {
            let interval = IntervalTrigger::new(Duration::from_secs(config.apps.reload_interval_secs));
            tasks.push(start_trigger(interval, &reload, &shutdown));
        }

        let tracker = ConnectionTracker::new();

        let admin_addr = if config.admin.enabled {
            let listener = bind_tcp(&config.admin.bind_address).await?;
            let addr = local_addr(&listener, &config.admin.bind_address)?;
            let state = AdminState {
                registry: Arc::clone(&registry),
                reload: reload.clone(),
                tracker: tracker.clone(),
                api_key: Arc::from(config.admin.api_key.as_str()),
            };
            let stop = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = admin::serve_admin(listener, state, stop).await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }));
            Some(addr)
        } else {
            None
        };

        let acceptor = load_tls_acceptor(&config.tls.cert_path, &config.tls.key_path)?;
        let connection_limit = Arc::new(Semaphore::new(config.listener.max_connections));

        let server = Arc::new(GatewayServer::new(
            Router::new(Arc::clone(&registry), config.routing.domain_suffix.as_deref()),
            TunnelProxy::from_config(&config.timeouts),
            HeadLimits::from_config(&config.limits, &config.timeouts),
            tracker.clone(),
        ));

        let https = Listener::bind(&config.listener.https_address, Arc::clone(&connection_limit)).await?;
        let https_addr = local_addr_of(&https, &config.listener.https_address)?;

        let http_addr = match config.listener.http_mode {
            HttpMode::Redirect => {
                let listener = bind_tcp(&config.listener.http_address).await?;
                let addr = local_addr(&listener, &config.listener.http_address)?;
                let stop = shutdown.subscribe();
                let https_port = https_addr.port();
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = serve_redirect(listener, https_port, stop).await {
                        tracing::error!(error = %e, "Redirect listener failed");
                    }
                }));
                Some(addr)
            }
            HttpMode::Proxy => {
                let listener =
                    Listener::bind(&config.listener.http_address, Arc::clone(&connection_limit)).await?;
                let addr = local_addr_of(&listener, &config.listener.http_address)?;
                let stop = shutdown.subscribe();
                let server = Arc::clone(&server);
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = server.serve_plain(listener, stop).await {
                        tracing::error!(error = %e, "HTTP listener failed");
                    }
                }));
                Some(addr)
            }
            HttpMode::Disabled => None,
        };

        let stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.serve_tls(https, acceptor, stop).await {
                tracing::error!(error = %e, "HTTPS listener failed");
            }
        }));

        tracing::info!(
            https = %https_addr,
            http = ?http_addr,
            admin = ?admin_addr,
            domain_suffix = ?config.routing.domain_suffix,
            "Gateway started"
        );

        Ok(Self {
            registry,
            reload,
            tracker,
            shutdown,
            drain_timeout: config.timeouts.shutdown(),
            https_addr,
            http_addr,
            admin_addr,
            tasks,
        })
    }

    pub fn https_addr(&self) -> SocketAddr {
        self.https_addr
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub fn registry(&self) -> &Arc<RegistrySwitch> {
        &self.registry
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Run until Ctrl-C or SIGTERM, then shut down gracefully.
    pub async fn run_until_signal(self) {
        wait_for_shutdown_signal().await;
        self.shutdown().await;
    }

    /// Stop accepting, then drain in-flight connections up to the
    /// configured shutdown timeout.
    pub async fn shutdown(self) {
        tracing::info!(active = self.tracker.active_count(), "Shutting down");
        self.shutdown.trigger();

        for task in self.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(TASK_STOP_GRACE, task).await.is_err() {
                abort.abort();
            }
        }

        if self.tracker.wait_for_shutdown(self.drain_timeout).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown deadline reached with connections still open"
            );
        }
    }
}

fn start_trigger<T: ReloadTrigger>(trigger: T, reload: &ReloadHandle, shutdown: &Shutdown) -> JoinHandle<()> {
    tracing::debug!(trigger = trigger.name(), "Starting reload trigger");
    trigger.spawn(reload.clone(), shutdown.subscribe())
}

async fn bind_tcp(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

fn local_addr(listener: &TcpListener, address: &str) -> Result<SocketAddr, StartupError> {
    listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

fn local_addr_of(listener: &Listener, address: &str) -> Result<SocketAddr, StartupError> {
    listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}
