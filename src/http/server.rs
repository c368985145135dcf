//! Gateway connection server.
//!
//! # Responsibilities
//! - Run the accept loops of the HTTPS (and optionally plain HTTP) listener
//! - Perform the TLS handshake under the header timeout
//! - Read the request head, route by Host, resolve the backend
//! - Answer routing and parsing failures with a status before hijack
//! - Hand the hijacked connection to the tunnel and record the outcome
//!
//! # Design Decisions
//! - One task per connection; no lock is held across any socket operation
//! - The registry snapshot is taken once per connection by the router
//! - Stop accepting on shutdown; in-flight connections finish on their own

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::http::request::HeadLimits;
use crate::net::connection::{ConnectionId, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::timeouts::deadline;
use crate::routing::Router;
use crate::tunnel::{HttpConnection, TunnelProxy};

/// Delay before accepting again after an accept error.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Shared per-connection pipeline: head → route → resolve → hijack → tunnel.
#[derive(Debug)]
pub struct GatewayServer {
    router: Router,
    proxy: TunnelProxy,
    limits: HeadLimits,
    tracker: ConnectionTracker,
}

impl GatewayServer {
    pub fn new(router: Router, proxy: TunnelProxy, limits: HeadLimits, tracker: ConnectionTracker) -> Self {
        Self {
            router,
            proxy,
            limits,
            tracker,
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept TLS connections until `shutdown` fires.
    pub async fn serve_tls(
        self: Arc<Self>,
        listener: Listener,
        acceptor: TlsAcceptor,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        loop {
            let (stream, peer, permit) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            metrics::record_connection("https");
            let guard = self.tracker.track();
            let span = tracing::info_span!("conn", id = %guard.id(), peer = %peer);
            let server = Arc::clone(&self);
            let acceptor = acceptor.clone();

            tokio::spawn(
                async move {
                    let _permit = permit;
                    match deadline(server.limits.timeout, "tls handshake", acceptor.accept(stream)).await {
                        Ok(Ok(tls)) => server.handle_connection(tls, peer, guard.id()).await,
                        Ok(Err(e)) => tracing::debug!(error = %e, "TLS handshake failed"),
                        Err(e) => tracing::debug!(error = %e, "TLS handshake timed out"),
                    }
                    drop(guard);
                }
                .instrument(span),
            );
        }

        tracing::info!("HTTPS listener stopped accepting");
        Ok(())
    }

    /// Accept plain TCP connections and feed them through the same pipeline.
    pub async fn serve_plain(
        self: Arc<Self>,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        loop {
            let (stream, peer, permit) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            metrics::record_connection("http");
            let guard = self.tracker.track();
            let span = tracing::info_span!("conn", id = %guard.id(), peer = %peer);
            let server = Arc::clone(&self);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    server.handle_connection(stream, peer, guard.id()).await;
                    drop(guard);
                }
                .instrument(span),
            );
        }

        tracing::info!("HTTP listener stopped accepting");
        Ok(())
    }

    /// Serve one client connection to completion.
    pub async fn handle_connection<S>(&self, stream: S, peer: SocketAddr, id: ConnectionId)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = HttpConnection::new(stream, peer, id);

        if let Err(e) = conn.read_request(&self.limits).await {
            match e.status() {
                Some((status, reason)) => {
                    tracing::debug!(error = %e, status, "Rejecting request");
                    let _ = conn.respond(status, reason, &e.to_string()).await;
                }
                None => tracing::trace!(error = %e, "Client went away before a request"),
            }
            return;
        }

        let Some(host) = conn.request().and_then(|r| r.host()).map(str::to_owned) else {
            let _ = conn.respond(400, "Bad Request", "Missing Host header").await;
            return;
        };

        let backend = match self.router.resolve(&host) {
            Ok(backend) => backend,
            Err(e) => {
                metrics::record_routing_failure(e.reason());
                tracing::info!(host = %host, reason = e.reason(), "No route");
                let _ = conn.respond(e.status(), "Not Found", &e.to_string()).await;
                return;
            }
        };

        let addrs = match self.proxy.resolve(&backend).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::error!(backend = %backend.address(), error = %e, "Backend address resolution failed");
                let _ = conn
                    .respond(500, "Internal Server Error", "Could not resolve backend address")
                    .await;
                return;
            }
        };

        let (tunnel, request) = match conn.hijack() {
            Ok(hijacked) => hijacked,
            Err(failed) => {
                tracing::error!(error = %failed.error, "Hijack failed");
                let _ = failed
                    .connection
                    .respond(500, "Internal Server Error", "Hijacking not supported")
                    .await;
                return;
            }
        };

        tracing::debug!(
            host = %host,
            key = %backend.key(),
            backend = %backend.address(),
            method = %request.method,
            "Tunneling"
        );

        let started = Instant::now();
        match self.proxy.run(tunnel, request, &backend, &addrs).await {
            Ok(stats) => {
                metrics::record_tunnel("ok", started);
                tracing::info!(
                    host = %host,
                    status = stats.status,
                    upgraded = stats.upgraded,
                    bytes_in = stats.bytes_to_backend,
                    bytes_out = stats.bytes_to_client,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tunnel finished"
                );
            }
            Err(e) => {
                metrics::record_tunnel(e.outcome(), started);
                tracing::warn!(host = %host, backend = %backend.address(), error = %e, "Tunnel aborted");
            }
        }
    }
}
