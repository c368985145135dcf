//! Backend address resolution and bounded connect.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};

use crate::resilience::timeouts::{deadline, Elapsed};

/// Failure to reach a backend.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("could not resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{address} resolved to no addresses")]
    NoAddresses { address: String },

    #[error("backend not reachable: {0}")]
    Connect(#[source] io::Error),

    #[error(transparent)]
    Timeout(#[from] Elapsed),
}

/// Resolve a `host:port` backend address.
pub async fn resolve(address: &str, limit: Duration) -> Result<Vec<SocketAddr>, DialError> {
    let addrs: Vec<SocketAddr> = deadline(limit, "backend resolve", lookup_host(address))
        .await?
        .map_err(|source| DialError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(DialError::NoAddresses {
            address: address.to_string(),
        });
    }
    Ok(addrs)
}

/// Connect to the first reachable address, bounded by `limit` overall.
pub async fn connect(addrs: &[SocketAddr], limit: Duration) -> Result<TcpStream, DialError> {
    let stream = deadline(limit, "backend connect", TcpStream::connect(addrs))
        .await?
        .map_err(DialError::Connect)?;

    // small request/response exchanges; don't wait on Nagle
    let _ = stream.set_nodelay(true);
    Ok(stream)
}
