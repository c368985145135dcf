//! Message body framing and framing-aware relay.
//!
//! The tunnel never copies "until EOF" unless the message itself says its
//! body is close-delimited. Backends that keep their side of the connection
//! alive after a response would otherwise hold the tunnel open forever.
//!
//! # Design Decisions
//! - Length is decided from `Content-Length`, then `Transfer-Encoding:
//!   chunked`, then connection close, in that order
//! - A request naming both `Content-Length` and `Transfer-Encoding` is
//!   refused before it reaches a backend
//! - Chunked bodies are relayed verbatim (sizes, extensions, trailers); they
//!   are parsed only to find where they end
//! - Every read and write is bounded by the idle timeout

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::head::{self, HeaderField};
use crate::resilience::timeouts::{deadline, Elapsed};

/// Longest chunk-size or trailer line accepted.
const MAX_LINE: usize = 8 * 1024;

/// How the end of a message body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body at all.
    Empty,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`, ending with the zero-size chunk.
    Chunked,
    /// Everything until the sender closes.
    CloseDelimited,
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("unsupported Transfer-Encoding on a request")]
    UnsupportedTransferEncoding,

    #[error("request carries both Content-Length and Transfer-Encoding")]
    AmbiguousLength,

    #[error("malformed chunked body: {0}")]
    MalformedChunk(&'static str),

    #[error("peer closed the connection before the body ended")]
    UnexpectedEof,

    #[error(transparent)]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BodyFraming {
    /// Framing of a request body. Requests without a length have no body.
    ///
    /// Both headers together are refused: the backend may honour the other
    /// one and read the remainder as a second request.
    pub fn for_request(headers: &[HeaderField]) -> Result<Self, FramingError> {
        let length = content_length(headers)?;
        let encoded = head::values(headers, "transfer-encoding").next().is_some();

        match (length, encoded) {
            (Some(_), true) => Err(FramingError::AmbiguousLength),
            (Some(length), false) => Ok(Self::length(length)),
            (None, true) if is_chunked(headers) => Ok(Self::Chunked),
            (None, true) => Err(FramingError::UnsupportedTransferEncoding),
            (None, false) => Ok(Self::Empty),
        }
    }

    /// Framing of a response body to a request with `method`.
    pub fn for_response(
        method: &str,
        status: u16,
        headers: &[HeaderField],
    ) -> Result<Self, FramingError> {
        if method.eq_ignore_ascii_case("HEAD")
            || (100..200).contains(&status)
            || status == 204
            || status == 304
        {
            return Ok(Self::Empty);
        }
        if let Some(length) = content_length(headers)? {
            return Ok(Self::length(length));
        }
        if is_chunked(headers) {
            return Ok(Self::Chunked);
        }
        Ok(Self::CloseDelimited)
    }

    fn length(length: u64) -> Self {
        if length == 0 {
            Self::Empty
        } else {
            Self::Length(length)
        }
    }
}

/// Parse `Content-Length`, rejecting conflicting or non-numeric values.
fn content_length(headers: &[HeaderField]) -> Result<Option<u64>, FramingError> {
    let mut found: Option<u64> = None;

    for header in head::values(headers, "content-length") {
        let value = header.value_str().ok_or(FramingError::InvalidContentLength)?;
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FramingError::InvalidContentLength);
            }
            let parsed: u64 = part.parse().map_err(|_| FramingError::InvalidContentLength)?;
            match found {
                Some(previous) if previous != parsed => {
                    return Err(FramingError::InvalidContentLength)
                }
                _ => found = Some(parsed),
            }
        }
    }
    Ok(found)
}

/// Chunked is the final transfer coding.
fn is_chunked(headers: &[HeaderField]) -> bool {
    head::values(headers, "transfer-encoding")
        .filter_map(HeaderField::value_str)
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
        .is_some_and(|t| t.eq_ignore_ascii_case("chunked"))
}

/// Relay one body from `reader` to `writer` according to `framing`.
///
/// Returns the number of bytes written, framing overhead included.
pub async fn relay_body<R, W>(
    reader: &mut R,
    writer: &mut W,
    framing: BodyFraming,
    idle: Duration,
) -> Result<u64, FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match framing {
        BodyFraming::Empty => Ok(0),
        BodyFraming::Length(length) => relay_exact(reader, writer, length, idle).await,
        BodyFraming::Chunked => relay_chunked(reader, writer, idle).await,
        BodyFraming::CloseDelimited => relay_to_eof(reader, writer, idle).await,
    }
}

async fn relay_exact<R, W>(
    reader: &mut R,
    writer: &mut W,
    length: u64,
    idle: Duration,
) -> Result<u64, FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = length;
    while remaining > 0 {
        let available = deadline(idle, "body read", reader.fill_buf()).await??;
        if available.is_empty() {
            return Err(FramingError::UnexpectedEof);
        }
        let take = available.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        deadline(idle, "body write", writer.write_all(&available[..take])).await??;
        reader.consume(take);
        remaining -= take as u64;
    }
    Ok(length)
}

async fn relay_to_eof<R, W>(reader: &mut R, writer: &mut W, idle: Duration) -> Result<u64, FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let available = deadline(idle, "body read", reader.fill_buf()).await??;
        if available.is_empty() {
            return Ok(total);
        }
        let take = available.len();
        deadline(idle, "body write", writer.write_all(available)).await??;
        reader.consume(take);
        total += take as u64;
    }
}

async fn relay_chunked<R, W>(reader: &mut R, writer: &mut W, idle: Duration) -> Result<u64, FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let size_line = read_line(reader, idle).await?;
        let size = parse_chunk_size(&size_line)?;
        deadline(idle, "body write", writer.write_all(&size_line)).await??;
        total += size_line.len() as u64;

        if size == 0 {
            // trailer section, terminated by an empty line
            loop {
                let line = read_line(reader, idle).await?;
                deadline(idle, "body write", writer.write_all(&line)).await??;
                total += line.len() as u64;
                if line == b"\r\n" || line == b"\n" {
                    return Ok(total);
                }
            }
        }

        total += relay_exact(reader, writer, size, idle).await?;

        let crlf = read_line(reader, idle).await?;
        if crlf != b"\r\n" && crlf != b"\n" {
            return Err(FramingError::MalformedChunk("missing CRLF after chunk data"));
        }
        deadline(idle, "body write", writer.write_all(&crlf)).await??;
        total += crlf.len() as u64;
    }
}

/// Read one line including its terminating `\n`.
async fn read_line<R>(reader: &mut R, idle: Duration) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let available = deadline(idle, "body read", reader.fill_buf()).await??;
        if available.is_empty() {
            return Err(FramingError::UnexpectedEof);
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&available[..=pos]);
                reader.consume(pos + 1);
                return Ok(line);
            }
            None => {
                let taken = available.len();
                line.extend_from_slice(available);
                reader.consume(taken);
            }
        }
        if line.len() > MAX_LINE {
            return Err(FramingError::MalformedChunk("line too long"));
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, FramingError> {
    let text = std::str::from_utf8(line).map_err(|_| FramingError::MalformedChunk("chunk size is not ASCII"))?;
    let digits = text
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    if digits.is_empty() || digits.len() > 16 {
        return Err(FramingError::MalformedChunk("bad chunk size"));
    }
    u64::from_str_radix(digits, 16).map_err(|_| FramingError::MalformedChunk("bad chunk size"))
}
