//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Host header
//!     → matcher.rs (lowercase, drop port and trailing dot, strip suffix)
//!     → router.rs (key lookup in RegistrySwitch::current())
//!     → Return: BackendDescriptor, InvalidDomain or UnknownApp
//! ```
//!
//! # Design Decisions
//! - Hostname routing only; the request path never influences the choice
//! - A host outside the configured suffix is rejected before the registry
//!   is consulted
//! - Pure: no I/O, one small allocation for the normalized host

pub mod matcher;
pub mod router;

pub use matcher::{normalize_host, DomainSuffix};
pub use router::{RouteError, Router};
