//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request head
//!     → http/request.rs (header count and size limits)
//!     → headers.rs (X-Forwarded-For augmentation, per backend)
//!     → forwarded to the backend
//! ```
//!
//! # Design Decisions
//! - Limits are enforced before hijack so violations still get a status
//! - No trust in client input: forwarded-for values are only ever extended

pub mod headers;

pub use headers::append_forwarded_for;
