//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional) + CLI flags
//!     → loader.rs (parse & deserialize)
//!     → cli.rs overrides (crate::cli)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! Backend descriptors are NOT part of this file: they live in the apps
//! directory and are hot-reloaded by crate::reload. watcher.rs is one of
//! the reload triggers.
//! ```
//!
//! # Design Decisions
//! - Settings are read once at startup; only the routing registry reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AppsConfig, GatewayConfig, HttpMode, LimitsConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RoutingConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
