//! Host normalization and domain-suffix matching.
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - A port in the Host header never takes part in the match
//! - A trailing dot (fully-qualified form) is ignored
//! - No wildcards or regex

/// Normalize a Host header value for lookup.
///
/// - Convert to lowercase
/// - Drop a `:port` suffix (IPv6 literals keep their brackets)
/// - Trim trailing dot
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();

    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port))
                if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) =>
            {
                name
            }
            _ => host,
        }
    };

    without_port.trim_end_matches('.').to_lowercase()
}

/// Parent domain stripped from inbound hostnames to derive the routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSuffix {
    suffix: String,
}

impl DomainSuffix {
    /// Returns `None` for an empty suffix. Leading and trailing dots are
    /// ignored, so `.example.com` and `example.com` are the same suffix.
    pub fn new(suffix: &str) -> Option<Self> {
        let suffix = suffix.trim().trim_matches('.').to_lowercase();
        if suffix.is_empty() {
            None
        } else {
            Some(Self { suffix })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.suffix
    }

    /// Strip `.<suffix>` from an already-normalized host.
    ///
    /// Returns `None` when the host is not strictly below the suffix,
    /// including the bare suffix itself.
    pub fn strip<'a>(&self, host: &'a str) -> Option<&'a str> {
        let label = host.strip_suffix(self.suffix.as_str())?;
        let key = label.strip_suffix('.')?;
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("App1.Example.COM"), "app1.example.com");
        assert_eq!(normalize_host("app1.example.com:8443"), "app1.example.com");
        assert_eq!(normalize_host("app1.example.com."), "app1.example.com");
        assert_eq!(normalize_host("[::1]:443"), "[::1]");
        assert_eq!(normalize_host("127.0.0.1:80"), "127.0.0.1");
        assert_eq!(normalize_host(""), "");
    }

    #[test]
    fn test_suffix_strip() {
        let suffix = DomainSuffix::new(".Example.com").unwrap();
        assert_eq!(suffix.as_str(), "example.com");

        assert_eq!(suffix.strip("app1.example.com"), Some("app1"));
        assert_eq!(suffix.strip("a.b.example.com"), Some("a.b"));
        assert_eq!(suffix.strip("example.com"), None);
        assert_eq!(suffix.strip(".example.com"), None);
        assert_eq!(suffix.strip("app1example.com"), None);
        assert_eq!(suffix.strip("app1.example.org"), None);
    }

    #[test]
    fn empty_suffix_is_none() {
        assert!(DomainSuffix::new("").is_none());
        assert!(DomainSuffix::new(" . ").is_none());
    }
}
