//! TLS-terminating edge gateway.
//!
//! Accepts HTTPS connections, picks a backend from the `Host` header using a
//! hot-reloadable registry of descriptor files, and relays the exchange to
//! that backend at the byte level.

pub mod admin;
pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod reload;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod tunnel;

pub use config::GatewayConfig;
pub use lifecycle::{Gateway, Shutdown};
pub use registry::{BackendDescriptor, Registry, RegistrySwitch};
pub use routing::Router;
pub use tunnel::TunnelProxy;
