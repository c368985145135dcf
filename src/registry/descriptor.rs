//! Backend descriptor: the routing record for one downstream service.
//!
//! Descriptor files hold a single JSON object. Field names are accepted in
//! the PascalCase used by existing deployments (`Name`, `Address`,
//! `AddForwardHeader`) as well as camel and snake case. `Domain` is an alias
//! for `Name` when the key is a full virtual-host name rather than an app id.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error produced while reading or parsing a single descriptor file.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse descriptor: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("descriptor has an empty name")]
    EmptyKey,

    #[error("invalid backend address {0:?} (expected host:port)")]
    InvalidAddress(String),
}

/// Immutable routing record.
///
/// Identity is the lowercased `key`; two descriptors with the same key are
/// mutually exclusive within one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    key: String,
    address: String,
    add_forward_header: bool,
}

/// On-disk shape of a descriptor file.
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    #[serde(alias = "Name", alias = "Domain", alias = "domain", alias = "key")]
    name: String,

    #[serde(alias = "Address")]
    address: String,

    #[serde(
        default,
        alias = "AddForwardHeader",
        alias = "addForwardHeader"
    )]
    add_forward_header: bool,
}

impl BackendDescriptor {
    /// Build a descriptor, normalizing the key to lowercase and checking the
    /// address has a `host:port` shape.
    pub fn new(
        key: impl AsRef<str>,
        address: impl Into<String>,
        add_forward_header: bool,
    ) -> Result<Self, DescriptorError> {
        let key = key.as_ref().trim().to_lowercase();
        if key.is_empty() {
            return Err(DescriptorError::EmptyKey);
        }

        let address = address.into().trim().to_string();
        validate_address(&address)?;

        Ok(Self {
            key,
            address,
            add_forward_header,
        })
    }

    /// Parse a descriptor from the raw contents of a descriptor file.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let file: DescriptorFile = serde_json::from_slice(bytes)?;
        Self::new(file.name, file.address, file.add_forward_header)
    }

    /// Read and parse one descriptor file.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let bytes = fs::read(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    /// Lowercased virtual-host name or app id.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Backend `host:port`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the client address is appended to `X-Forwarded-For`.
    pub fn add_forward_header(&self) -> bool {
        self.add_forward_header
    }
}

fn validate_address(address: &str) -> Result<(), DescriptorError> {
    let invalid = || DescriptorError::InvalidAddress(address.to_string());

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host == "[]" {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}
