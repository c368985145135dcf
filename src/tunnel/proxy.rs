//! One request's journey through the tunnel.
//!
//! # Data Flow
//! ```text
//! RawTunnel + InboundRequest + BackendDescriptor
//!     → dial backend (connect timeout)
//!     → forward head (+ X-Forwarded-For) and request body per its framing
//!     → read response head(s); relay interim 1xx
//!     → relay final head (Connection: close) and body per its framing
//!        or, on 101, pump both directions
//!     → shut down both sockets
//! ```
//!
//! # Design Decisions
//! - Nothing is retried: a partially sent request cannot be replayed safely
//! - Every failure after hijack ends in a closed connection, never a status
//! - Both sockets are closed on every return path; the backend by drop, the
//!   client by an explicit shutdown so TLS sends close_notify

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::TimeoutConfig;
use crate::http::framing::{relay_body, BodyFraming, FramingError};
use crate::http::head::{read_head, HeadError};
use crate::http::request::InboundRequest;
use crate::http::response::{ResponseError, ResponseHead};
use crate::net::dial::{self, DialError};
use crate::registry::BackendDescriptor;
use crate::resilience::timeouts::{deadline, Elapsed};
use crate::security::append_forwarded_for;
use crate::tunnel::hijack::RawTunnel;
use crate::tunnel::pump::{pump, PumpError};

/// Largest response head accepted from a backend.
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// How long teardown waits for the client side to accept a shutdown.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Failure after hijack. Only logged; the client sees the connection close.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("relaying request body: {0}")]
    RequestBody(#[source] FramingError),

    #[error("reading backend response head: {0}")]
    ResponseHead(#[source] HeadError),

    #[error(transparent)]
    MalformedResponse(#[from] ResponseError),

    #[error("relaying response body: {0}")]
    ResponseBody(#[source] FramingError),

    #[error("upgraded relay: {0}")]
    Upgraded(#[from] PumpError),

    #[error(transparent)]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TunnelError {
    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            TunnelError::Dial(_) => "dial_failed",
            TunnelError::Timeout(_)
            | TunnelError::RequestBody(FramingError::Timeout(_))
            | TunnelError::ResponseBody(FramingError::Timeout(_))
            | TunnelError::Upgraded(PumpError::Idle(_)) => "timeout",
            TunnelError::ResponseHead(_) | TunnelError::MalformedResponse(_) => "bad_response",
            _ => "io_error",
        }
    }
}

/// What one tunnel invocation moved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TunnelStats {
    pub status: u16,
    pub bytes_to_backend: u64,
    pub bytes_to_client: u64,
    pub upgraded: bool,
}

/// Relays a hijacked client connection to a backend for one exchange.
#[derive(Debug, Clone)]
pub struct TunnelProxy {
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl TunnelProxy {
    pub fn new(connect_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            idle_timeout,
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(timeouts.connect(), timeouts.idle())
    }

    /// Resolve the backend address. Runs before hijack so a failure can
    /// still be answered with a status.
    pub async fn resolve(&self, backend: &BackendDescriptor) -> Result<Vec<SocketAddr>, DialError> {
        dial::resolve(backend.address(), self.connect_timeout).await
    }

    /// Run the exchange and tear both connections down.
    pub async fn run<S>(
        &self,
        tunnel: RawTunnel<S>,
        request: InboundRequest,
        backend: &BackendDescriptor,
        addrs: &[SocketAddr],
    ) -> Result<TunnelStats, TunnelError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer = tunnel.peer();
        let mut client = tunnel.into_stream();

        let result = self.exchange(&mut client, peer, request, backend, addrs).await;

        // the backend socket was dropped inside exchange
        let _ = deadline(TEARDOWN_GRACE, "client shutdown", client.get_mut().shutdown()).await;
        result
    }

    async fn exchange<S>(
        &self,
        client: &mut BufReader<S>,
        peer: SocketAddr,
        request: InboundRequest,
        backend: &BackendDescriptor,
        addrs: &[SocketAddr],
    ) -> Result<TunnelStats, TunnelError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let idle = self.idle_timeout;
        let upstream = dial::connect(addrs, self.connect_timeout).await?;
        tracing::debug!(backend = %backend.address(), "Backend connected");
        let mut upstream = BufReader::new(upstream);
        let mut stats = TunnelStats::default();

        let mut headers = request.headers.clone();
        if backend.add_forward_header() {
            append_forwarded_for(&mut headers, peer);
        }
        let head = request.encode_head_with(&headers);
        deadline(idle, "backend write", upstream.get_mut().write_all(&head)).await??;
        stats.bytes_to_backend += head.len() as u64;

        stats.bytes_to_backend += relay_body(client, upstream.get_mut(), request.framing, idle)
            .await
            .map_err(TunnelError::RequestBody)?;
        deadline(idle, "backend write", upstream.get_mut().flush()).await??;

        loop {
            let raw = deadline(idle, "backend response head", read_head(&mut upstream, MAX_RESPONSE_HEAD))
                .await?
                .map_err(TunnelError::ResponseHead)?;
            let response = ResponseHead::parse(&raw)?;
            stats.status = response.status;

            if response.is_interim() {
                write_client(client, &raw, idle).await?;
                stats.bytes_to_client += raw.len() as u64;
                continue;
            }

            if response.is_upgrade() {
                let encoded = response.encode();
                write_client(client, &encoded, idle).await?;
                stats.bytes_to_client += encoded.len() as u64;
                stats.upgraded = true;

                let totals = pump(client, &mut upstream, idle).await?;
                stats.bytes_to_backend += totals.a_to_b;
                stats.bytes_to_client += totals.b_to_a;
                return Ok(stats);
            }

            let framing = BodyFraming::for_response(&request.method, response.status, &response.headers)
                .map_err(TunnelError::ResponseBody)?;
            let encoded = response.encode_closing();
            write_client(client, &encoded, idle).await?;
            stats.bytes_to_client += encoded.len() as u64;

            stats.bytes_to_client += relay_body(&mut upstream, client.get_mut(), framing, idle)
                .await
                .map_err(TunnelError::ResponseBody)?;
            deadline(idle, "client write", client.get_mut().flush()).await??;

            return Ok(stats);
        }
    }
}

async fn write_client<S>(client: &mut BufReader<S>, bytes: &[u8], idle: Duration) -> Result<(), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let stream = client.get_mut();
    deadline(idle, "client write", stream.write_all(bytes)).await??;
    deadline(idle, "client write", stream.flush()).await??;
    Ok(())
}
