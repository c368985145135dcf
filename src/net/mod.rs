//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, shared connection limit)
//!     → tls.rs (TLS handshake on the HTTPS listener)
//!     → connection.rs (ID, lifecycle tracking)
//!     → Hand off to HTTP layer
//!
//! Outgoing backend connection
//!     → dial.rs (resolve, bounded connect)
//! ```
//!
//! # Design Decisions
//! - One semaphore bounds connections across both listeners
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod dial;
pub mod listener;
pub mod tls;
