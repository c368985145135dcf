//! Raw-byte tunneling subsystem.
//!
//! # Data Flow
//! ```text
//! HttpConnection (structured: read head, answer 4xx/5xx)
//!     → hijack()  [one-way]
//!     → RawTunnel (bytes only)
//!     → proxy.rs TunnelProxy::run (dial, forward, framed relay, teardown)
//!         → pump.rs (after 101 Switching Protocols)
//! ```
//!
//! # Design Decisions
//! - Structured and raw connections are distinct types, so a status cannot
//!   be written after hijack
//! - One request per connection; the connection closes after the exchange

pub mod hijack;
pub mod proxy;
pub mod pump;

pub use hijack::{HijackError, HijackFailed, HttpConnection, RawTunnel};
pub use proxy::{TunnelError, TunnelProxy, TunnelStats};
