//! Host-based backend lookup.

use std::sync::Arc;

use crate::registry::{BackendDescriptor, RegistrySwitch};
use crate::routing::matcher::{normalize_host, DomainSuffix};

/// Why no backend was selected. Both map to `404 Not Found`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The host is not below the configured domain suffix.
    #[error("Invalid domain")]
    InvalidDomain { host: String },

    /// No descriptor is registered under the derived key.
    #[error("Unknown app name")]
    UnknownApp { key: String },
}

impl RouteError {
    pub fn status(&self) -> u16 {
        404
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            RouteError::InvalidDomain { .. } => "invalid_domain",
            RouteError::UnknownApp { .. } => "unknown_app",
        }
    }
}

/// Maps an inbound hostname to a backend using the active registry.
#[derive(Debug)]
pub struct Router {
    registry: Arc<RegistrySwitch>,
    suffix: Option<DomainSuffix>,
}

impl Router {
    pub fn new(registry: Arc<RegistrySwitch>, domain_suffix: Option<&str>) -> Self {
        Self {
            registry,
            suffix: domain_suffix.and_then(DomainSuffix::new),
        }
    }

    /// Resolve a Host header value to a backend descriptor.
    pub fn resolve(&self, host: &str) -> Result<Arc<BackendDescriptor>, RouteError> {
        let normalized = normalize_host(host);

        let key = match &self.suffix {
            Some(suffix) => suffix
                .strip(&normalized)
                .ok_or_else(|| RouteError::InvalidDomain {
                    host: normalized.clone(),
                })?,
            None => normalized.as_str(),
        };

        let registry = self.registry.current();
        registry
            .get(key)
            .cloned()
            .ok_or_else(|| RouteError::UnknownApp {
                key: key.to_string(),
            })
    }
}
