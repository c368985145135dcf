//! Command-line surface of the gateway binary.
//!
//! Flags override the optional TOML file; the merged settings are validated
//! before anything starts.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{loader, validate_config, ConfigError, GatewayConfig, HttpMode};

#[derive(Debug, Parser)]
#[command(name = "edge-gateway")]
#[command(about = "TLS-terminating edge gateway routing by Host header", long_about = None)]
pub struct Cli {
    /// TOML settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Plain HTTP listen address
    #[arg(long, value_name = "ADDR")]
    pub http: Option<String>,

    /// HTTPS listen address
    #[arg(long, value_name = "ADDR")]
    pub https: Option<String>,

    /// Directory of backend descriptor files
    #[arg(long, value_name = "DIR")]
    pub apps: Option<PathBuf>,

    /// Parent domain stripped from hostnames to derive the app key
    #[arg(long, value_name = "SUFFIX")]
    pub domain: Option<String>,

    /// PEM certificate chain
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// What the plain HTTP listener does: redirect, proxy or disabled
    #[arg(long, value_name = "MODE")]
    pub http_mode: Option<HttpMode>,
}

impl Cli {
    /// Build validated settings from the file (if any) and the flags.
    pub fn settings(&self) -> Result<GatewayConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => loader::read_config(path)?,
            None => GatewayConfig::default(),
        };
        let config = self.apply(base);

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(http) = &self.http {
            config.listener.http_address = http.clone();
        }
        if let Some(https) = &self.https {
            config.listener.https_address = https.clone();
        }
        if let Some(mode) = self.http_mode {
            config.listener.http_mode = mode;
        }
        if let Some(apps) = &self.apps {
            config.apps.dir = apps.clone();
        }
        if let Some(domain) = &self.domain {
            config.routing.domain_suffix = Some(domain.clone());
        }
        if let Some(cert) = &self.cert {
            config.tls.cert_path = cert.clone();
        }
        if let Some(key) = &self.key {
            config.tls.key_path = key.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "edge-gateway",
            "--https",
            "127.0.0.1:8443",
            "--apps",
            "/etc/gateway/apps",
            "--domain",
            "example.com",
            "--http-mode",
            "disabled",
        ]);
        let config = cli.apply(GatewayConfig::default());

        assert_eq!(config.listener.https_address, "127.0.0.1:8443");
        assert_eq!(config.listener.http_address, "0.0.0.0:80");
        assert_eq!(config.listener.http_mode, HttpMode::Disabled);
        assert_eq!(config.apps.dir, PathBuf::from("/etc/gateway/apps"));
        assert_eq!(config.routing.domain_suffix.as_deref(), Some("example.com"));
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            "[routing]\ndomain_suffix = \"example.org\"\n[apps]\nextension = \".app\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "edge-gateway",
            "--config",
            path.to_str().unwrap(),
            "--domain",
            "example.com",
        ]);
        let config = cli.settings().unwrap();

        assert_eq!(config.routing.domain_suffix.as_deref(), Some("example.com"));
        assert_eq!(config.apps.extension, ".app");
    }

    #[test]
    fn invalid_flag_value_fails_validation() {
        let cli = Cli::parse_from(["edge-gateway", "--https", "not-an-address"]);
        assert!(matches!(cli.settings(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn unknown_http_mode_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["edge-gateway", "--http-mode", "sideways"]).is_err());
    }
}
