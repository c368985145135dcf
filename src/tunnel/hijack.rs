//! Structured connection and the one-way handoff to a raw tunnel.
//!
//! An [`HttpConnection`] can read one request head and answer it with a
//! status. [`HttpConnection::hijack`] consumes it and yields a [`RawTunnel`],
//! which only exposes the byte stream. After that point no status line can
//! be produced for the client, and the type system makes sure nobody tries.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::http::head::read_head;
use crate::http::request::{HeadLimits, InboundRequest, RequestError};
use crate::http::response::plain_response;
use crate::net::connection::ConnectionId;
use crate::resilience::timeouts::deadline;

/// An accepted (and, on the TLS listener, decrypted) client connection that
/// still speaks structured HTTP.
pub struct HttpConnection<S> {
    stream: BufReader<S>,
    peer: SocketAddr,
    id: ConnectionId,
    request: Option<InboundRequest>,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, id: ConnectionId) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            id,
            request: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn request(&self) -> Option<&InboundRequest> {
        self.request.as_ref()
    }

    /// Read and parse the request head within `limits`.
    ///
    /// Body bytes that arrived with the head stay buffered and travel with
    /// the tunnel after hijack.
    pub async fn read_request(&mut self, limits: &HeadLimits) -> Result<(), RequestError> {
        let raw = deadline(limits.timeout, "request head", read_head(&mut self.stream, limits.max_bytes))
            .await
            .map_err(|_| RequestError::Timeout)??;

        self.request = Some(InboundRequest::parse(&raw, limits.max_headers)?);
        Ok(())
    }

    /// Answer with a plain-text status and close the connection.
    pub async fn respond(mut self, status: u16, reason: &str, message: &str) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(&plain_response(status, reason, message)).await?;
        stream.flush().await?;
        stream.shutdown().await
    }

    /// Take raw-byte ownership of the connection.
    ///
    /// Fails, returning the connection untouched, when no request head has
    /// been read, since there would be nothing to forward.
    pub fn hijack(self) -> Result<(RawTunnel<S>, InboundRequest), HijackFailed<S>> {
        let Self {
            stream,
            peer,
            id,
            request,
        } = self;

        match request {
            Some(request) => Ok((RawTunnel { stream, peer, id }, request)),
            None => Err(HijackFailed {
                error: HijackError::NoRequest,
                connection: HttpConnection {
                    stream,
                    peer,
                    id,
                    request: None,
                },
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HijackError {
    #[error("no request has been read from the connection")]
    NoRequest,
}

/// A failed hijack hands the structured connection back so it can still be
/// answered with a status.
pub struct HijackFailed<S> {
    pub error: HijackError,
    pub connection: HttpConnection<S>,
}

/// Raw byte ownership of a client connection after hijack.
///
/// The buffered reader is kept so bytes already read past the request head
/// (the start of the body) are not lost.
pub struct RawTunnel<S> {
    stream: BufReader<S>,
    peer: SocketAddr,
    id: ConnectionId,
}

impl<S> RawTunnel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn into_stream(self) -> BufReader<S> {
        self.stream
    }
}
