//! Inbound request head parsing.
//!
//! # Responsibilities
//! - Parse the request line and headers of the first request on a connection
//! - Enforce header count and size limits before anything is forwarded
//! - Determine request body framing
//! - Re-serialize the head for the backend
//!
//! # Design Decisions
//! - Only the head is parsed; the body stays on the wire and is relayed raw
//! - Header names keep their original casing and order when forwarded

use std::time::Duration;

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::http::framing::{BodyFraming, FramingError};
use crate::http::head::{self, HeadError, HeaderField};

/// Limits applied while reading a request head.
#[derive(Debug, Clone, Copy)]
pub struct HeadLimits {
    pub max_bytes: usize,
    pub max_headers: usize,
    pub timeout: Duration,
}

impl HeadLimits {
    pub fn from_config(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_bytes: limits.max_header_bytes,
            max_headers: limits.max_headers,
            timeout: timeouts.header(),
        }
    }
}

impl Default for HeadLimits {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default(), &TimeoutConfig::default())
    }
}

/// A request head could not be accepted. Answered before hijack.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Client went away without sending anything; nothing to answer.
    #[error("client closed the connection")]
    Closed,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request header fields too large")]
    TooLarge,

    #[error("invalid request body framing: {0}")]
    Body(#[from] FramingError),

    #[error("request head not received in time")]
    Timeout,

    #[error(transparent)]
    Io(std::io::Error),
}

impl RequestError {
    /// Status line to answer with, if the client can still be answered.
    pub fn status(&self) -> Option<(u16, &'static str)> {
        match self {
            RequestError::Closed | RequestError::Io(_) => None,
            RequestError::Malformed(_) | RequestError::Body(_) => Some((400, "Bad Request")),
            RequestError::TooLarge => Some((431, "Request Header Fields Too Large")),
            RequestError::Timeout => Some((408, "Request Timeout")),
        }
    }
}

impl From<HeadError> for RequestError {
    fn from(err: HeadError) -> Self {
        match err {
            HeadError::Closed => RequestError::Closed,
            HeadError::UnexpectedEof => RequestError::Malformed("truncated request head".into()),
            HeadError::TooLarge(_) => RequestError::TooLarge,
            HeadError::Io(e) => RequestError::Io(e),
        }
    }
}

/// The structured view of a request, available until the connection is hijacked.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    pub target: String,
    /// Minor HTTP/1 version (`0` or `1`).
    pub version: u8,
    pub headers: Vec<HeaderField>,
    pub framing: BodyFraming,
}

impl InboundRequest {
    /// Parse a complete request head, terminator included.
    pub fn parse(raw: &[u8], max_headers: usize) -> Result<Self, RequestError> {
        let mut slots = vec![httparse::EMPTY_HEADER; max_headers];
        let mut parsed = httparse::Request::new(&mut slots);

        match parsed.parse(raw) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(RequestError::Malformed("incomplete request head".into()))
            }
            Err(httparse::Error::TooManyHeaders) => return Err(RequestError::TooLarge),
            Err(e) => return Err(RequestError::Malformed(e.to_string())),
        }

        let (Some(method), Some(target), Some(version)) =
            (parsed.method, parsed.path, parsed.version)
        else {
            return Err(RequestError::Malformed("incomplete request line".into()));
        };

        let headers: Vec<HeaderField> = parsed
            .headers
            .iter()
            .map(|h| HeaderField::new(h.name, h.value))
            .collect();

        let framing = BodyFraming::for_request(&headers)?;

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version,
            headers,
            framing,
        })
    }

    /// Value of the `Host` header, or the authority of an absolute-form target.
    pub fn host(&self) -> Option<&str> {
        if let Some(host) = head::values(&self.headers, "host")
            .next()
            .and_then(HeaderField::value_str)
            .map(str::trim)
            .filter(|h| !h.is_empty())
        {
            return Some(host);
        }

        let rest = self
            .target
            .strip_prefix("http://")
            .or_else(|| self.target.strip_prefix("https://"))?;
        let authority = rest.split(['/', '?']).next()?;
        (!authority.is_empty()).then_some(authority)
    }

    /// Serialize the head with the given header set.
    pub fn encode_head_with(&self, headers: &[HeaderField]) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(format!(" HTTP/1.{}\r\n", self.version).as_bytes());
        head::write_fields(&mut out, headers);
        out
    }

    pub fn encode_head(&self) -> Vec<u8> {
        self.encode_head_with(&self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_and_headers() {
        let raw = b"POST /submit?x=1 HTTP/1.1\r\nHost: app1.example.com\r\nContent-Length: 3\r\n\r\n";
        let request = InboundRequest::parse(raw, 16).unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/submit?x=1");
        assert_eq!(request.version, 1);
        assert_eq!(request.host(), Some("app1.example.com"));
        assert_eq!(request.framing, BodyFraming::Length(3));
    }

    #[test]
    fn encode_preserves_order_and_casing() {
        let raw = b"GET / HTTP/1.1\r\nhost: a\r\nX-Custom: One\r\naccept: */*\r\n\r\n";
        let request = InboundRequest::parse(raw, 16).unwrap();
        assert_eq!(request.encode_head(), raw.to_vec());
    }

    #[test]
    fn host_falls_back_to_absolute_target() {
        let raw = b"GET http://app1.example.com/path HTTP/1.1\r\n\r\n";
        let request = InboundRequest::parse(raw, 16).unwrap();
        assert_eq!(request.host(), Some("app1.example.com"));

        let raw = b"GET /path HTTP/1.0\r\n\r\n";
        assert_eq!(InboundRequest::parse(raw, 16).unwrap().host(), None);
    }

    #[test]
    fn too_many_headers_is_431() {
        let raw = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n";
        let err = InboundRequest::parse(raw, 2).unwrap_err();
        assert_eq!(err.status(), Some((431, "Request Header Fields Too Large")));
    }

    #[test]
    fn garbage_is_400() {
        let err = InboundRequest::parse(b"\x16\x03\x01 nonsense\r\n\r\n", 16).unwrap_err();
        assert_eq!(err.status().map(|s| s.0), Some(400));
    }

    #[test]
    fn invalid_content_length_is_400() {
        let raw = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: abc\r\n\r\n";
        let err = InboundRequest::parse(raw, 16).unwrap_err();
        assert!(matches!(err, RequestError::Body(_)));
        assert_eq!(err.status().map(|s| s.0), Some(400));
    }

    #[test]
    fn length_and_chunked_together_is_400() {
        let raw = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n";
        let err = InboundRequest::parse(raw, 16).unwrap_err();
        assert!(matches!(err, RequestError::Body(FramingError::AmbiguousLength)));
        assert_eq!(err.status().map(|s| s.0), Some(400));
    }

    #[test]
    fn closed_connection_gets_no_answer() {
        assert_eq!(RequestError::from(HeadError::Closed).status(), None);
    }
}
