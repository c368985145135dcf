//! Backend response heads and locally generated responses.
//!
//! # Responsibilities
//! - Parse the status line and headers of a backend response
//! - Rewrite the head so the client knows the connection ends with it
//! - Build the small plain-text responses sent before hijack
//!
//! # Design Decisions
//! - Only `Connection` and `Keep-Alive` are rewritten; everything else is
//!   relayed as the backend sent it

use crate::http::head::{self, HeaderField};

/// Upper bound on response header fields accepted from a backend.
const MAX_RESPONSE_HEADERS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("malformed response head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("incomplete response head")]
    Incomplete,
}

/// Status line and headers of a backend response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: u8,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<HeaderField>,
}

impl ResponseHead {
    pub fn parse(raw: &[u8]) -> Result<Self, ResponseError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
        let mut parsed = httparse::Response::new(&mut slots);

        match parsed.parse(raw)? {
            httparse::Status::Complete(_) => {}
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        }

        let (Some(version), Some(status)) = (parsed.version, parsed.code) else {
            return Err(ResponseError::Incomplete);
        };

        Ok(Self {
            version,
            status,
            reason: parsed.reason.unwrap_or_default().to_string(),
            headers: parsed
                .headers
                .iter()
                .map(|h| HeaderField::new(h.name, h.value))
                .collect(),
        })
    }

    /// Informational response after which the final response still follows.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.status) && self.status != 101
    }

    pub fn is_upgrade(&self) -> bool {
        self.status == 101
    }

    /// Serialize for the client, announcing that the connection closes after
    /// this response.
    pub fn encode_closing(&self) -> Vec<u8> {
        let mut headers: Vec<HeaderField> = self
            .headers
            .iter()
            .filter(|h| !h.is("connection") && !h.is("keep-alive"))
            .cloned()
            .collect();
        headers.push(HeaderField::new("Connection", "close"));
        self.encode_with(&headers)
    }

    /// Serialize exactly as received.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with(&self.headers)
    }

    fn encode_with(&self, headers: &[HeaderField]) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(
            format!("HTTP/1.{} {} {}\r\n", self.version, self.status, self.reason).as_bytes(),
        );
        head::write_fields(&mut out, headers);
        out
    }
}

/// A complete `text/plain` response that closes the connection.
pub fn plain_response(status: u16, reason: &str, message: &str) -> Vec<u8> {
    let body = format!("{message}\n");
    format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         X-Content-Type-Options: nosniff\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_encode_replaces_connection_headers() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\nKeep-Alive: timeout=5\r\n\r\n";
        let head = ResponseHead::parse(raw).unwrap();
        assert_eq!(head.status, 200);

        let encoded = String::from_utf8(head.encode_closing()).unwrap();
        assert_eq!(
            encoded,
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn interim_and_upgrade() {
        let cont = ResponseHead::parse(b"HTTP/1.1 100 Continue\r\n\r\n").unwrap();
        assert!(cont.is_interim());

        let upgrade = ResponseHead::parse(
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n",
        )
        .unwrap();
        assert!(upgrade.is_upgrade());
        assert!(!upgrade.is_interim());
        assert!(String::from_utf8(upgrade.encode()).unwrap().contains("Connection: Upgrade"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(ResponseHead::parse(b"NOT HTTP\r\n\r\n").is_err());
    }

    #[test]
    fn plain_response_is_self_delimiting() {
        let bytes = plain_response(404, "Not Found", "Unknown app name");
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 17\r\n"));
        assert!(text.ends_with("\r\n\r\nUnknown app name\n"));
    }
}
