//! Configuration schema definitions.
//!
//! This module defines the complete settings structure for the gateway.
//! All types derive Serde traits for deserialization from a TOML file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::registry::DuplicatePolicy;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind addresses, plaintext behaviour).
    pub listener: ListenerConfig,

    /// Certificate and key for the TLS listener.
    pub tls: TlsConfig,

    /// Backend descriptor directory and reload settings.
    pub apps: AppsConfig,

    /// Host-to-key mapping.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request head limits.
    pub limits: LimitsConfig,

    /// Admin API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// What the plaintext listener does with requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpMode {
    /// Answer every request with a redirect to the HTTPS URL.
    #[default]
    Redirect,
    /// Route and tunnel plaintext requests exactly like TLS ones.
    Proxy,
    /// Do not bind a plaintext listener.
    Disabled,
}

impl std::str::FromStr for HttpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redirect" => Ok(Self::Redirect),
            "proxy" => Ok(Self::Proxy),
            "disabled" | "off" => Ok(Self::Disabled),
            other => Err(format!("unknown http mode: {}", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plaintext bind address (e.g., "0.0.0.0:80").
    pub http_address: String,

    /// TLS bind address (e.g., "0.0.0.0:443").
    pub https_address: String,

    /// Plaintext listener behaviour.
    pub http_mode: HttpMode,

    /// Maximum concurrent connections per listener (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
            http_mode: HttpMode::Redirect,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to private key (PEM).
    pub key_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
        }
    }
}

/// Backend descriptor directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Directory scanned (non-recursively) for descriptor files.
    pub dir: PathBuf,

    /// File-name suffix of descriptor files.
    pub extension: String,

    /// Resolution when two files claim the same key.
    pub duplicate_policy: DuplicatePolicy,

    /// Reload when files in `dir` change.
    pub watch: bool,

    /// Periodic reload interval in seconds (0 = disabled).
    pub reload_interval_secs: u64,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("gaas.d"),
            extension: ".conf".to_string(),
            duplicate_policy: DuplicatePolicy::LastWins,
            watch: false,
            reload_interval_secs: 0,
        }
    }
}

/// Host-to-key mapping.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Parent domain stripped from the Host header to obtain the key.
    /// When unset the whole host is the key.
    pub domain_suffix: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connect (and name resolution) timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the TLS handshake plus the request head, in seconds.
    pub header_secs: u64,

    /// Maximum silence on either socket while tunnelling, in seconds.
    pub idle_secs: u64,

    /// Drain deadline for in-flight connections at shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            header_secs: 10,
            idle_secs: 60,
            shutdown_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn header(&self) -> Duration {
        Duration::from_secs(self.header_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

/// Request head limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a request or response head in bytes.
    pub max_header_bytes: usize,

    /// Maximum number of header fields.
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_headers: 100,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: String::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
