//! Forwarding header augmentation.
//!
//! # Responsibilities
//! - Record the client's address in `X-Forwarded-For`
//!
//! # Design Decisions
//! - Existing values are never overwritten or removed, only extended
//! - The address is the literal `ip:port` of the TCP peer

use std::net::SocketAddr;

use crate::http::head::HeaderField;

pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Append `peer` to the request's forwarded-for chain.
///
/// When the header is already present (possibly several times), the address
/// is appended to the last occurrence so the chain stays in order.
pub fn append_forwarded_for(headers: &mut Vec<HeaderField>, peer: SocketAddr) {
    let addr = peer.to_string();

    let Some(existing) = headers.iter().rposition(|h| h.is(X_FORWARDED_FOR)) else {
        headers.push(HeaderField::new(X_FORWARDED_FOR, addr));
        return;
    };

    let value = &mut headers[existing].value;
    if value.iter().all(u8::is_ascii_whitespace) {
        *value = addr.into_bytes();
    } else {
        value.extend_from_slice(b", ");
        value.extend_from_slice(addr.as_bytes());
    }
}
