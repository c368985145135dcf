//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend dial, request head read, every tunnel read/write:
//!     → timeouts.rs (enforce connect / header / idle deadlines)
//!     → On expiry: the operation fails with `Elapsed`, the caller closes
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every socket operation has a deadline
//! - Nothing in the tunnel path is retried: request bodies may not be
//!   replayable once partially sent

pub mod timeouts;
