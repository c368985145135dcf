//! Message head reading shared by the request and response sides.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One header field, kept with its original name casing and raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// All values of `name`, in order of appearance.
pub fn values<'a>(headers: &'a [HeaderField], name: &'a str) -> impl Iterator<Item = &'a HeaderField> {
    headers.iter().filter(move |h| h.is(name))
}

/// Serialize header fields followed by the blank line ending the head.
pub fn write_fields(out: &mut Vec<u8>, headers: &[HeaderField]) {
    for header in headers {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&header.value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

/// Failure while reading a head off the wire.
#[derive(Debug, thiserror::Error)]
pub enum HeadError {
    #[error("connection closed before any data")]
    Closed,

    #[error("connection closed in the middle of a message head")]
    UnexpectedEof,

    #[error("message head exceeds {0} bytes")]
    TooLarge(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read bytes up to and including the blank line that ends a message head.
///
/// Bytes after the head stay buffered in `reader`.
pub async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, HeadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Err(if head.is_empty() {
                HeadError::Closed
            } else {
                HeadError::UnexpectedEof
            });
        }

        // the terminator may straddle two reads
        let scan_from = head.len().saturating_sub(3);
        let taken = available.len();
        head.extend_from_slice(available);

        if let Some(end) = head_end(&head[scan_from..]).map(|e| e + scan_from) {
            let surplus = head.len() - end;
            reader.consume(taken - surplus);
            head.truncate(end);
            if end > max_bytes {
                return Err(HeadError::TooLarge(max_bytes));
            }
            return Ok(head);
        }

        reader.consume(taken);
        if head.len() > max_bytes {
            return Err(HeadError::TooLarge(max_bytes));
        }
    }
}

/// Index just past the first empty line (`\n\n` or `\n\r\n`).
fn head_end(buf: &[u8]) -> Option<usize> {
    buf.iter().enumerate().find_map(|(i, &b)| {
        if b != b'\n' {
            return None;
        }
        match (buf.get(i + 1), buf.get(i + 2)) {
            (Some(b'\n'), _) => Some(i + 2),
            (Some(b'\r'), Some(b'\n')) => Some(i + 3),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn leaves_body_bytes_buffered() {
        let data: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\n\r\nBODY";
        let mut reader = BufReader::new(data);

        let head = read_head(&mut reader, 1024).await.unwrap();
        assert_eq!(head, b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"BODY");
    }

    #[tokio::test]
    async fn finds_terminator_split_across_reads() {
        let data: &[u8] = b"HTTP/1.1 200 OK\r\nA: b\r\n\r\nxyz";
        // capacity 1 forces a read per byte
        let mut reader = BufReader::with_capacity(1, data);

        let head = read_head(&mut reader, 1024).await.unwrap();
        assert!(head.ends_with(b"A: b\r\n\r\n"));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"xyz");
    }

    #[tokio::test]
    async fn accepts_bare_newlines() {
        let data: &[u8] = b"GET / HTTP/1.0\nHost: a\n\n";
        let mut reader = BufReader::new(data);
        assert_eq!(read_head(&mut reader, 1024).await.unwrap().len(), data.len());
    }

    #[tokio::test]
    async fn reports_eof_and_size_limits() {
        let mut empty = BufReader::new(&b""[..]);
        assert!(matches!(read_head(&mut empty, 1024).await, Err(HeadError::Closed)));

        let mut partial = BufReader::new(&b"GET / HTTP/1.1\r\nHost"[..]);
        assert!(matches!(read_head(&mut partial, 1024).await, Err(HeadError::UnexpectedEof)));

        let big = format!("GET / HTTP/1.1\r\nX: {}\r\n\r\n", "a".repeat(2048));
        let mut reader = BufReader::new(big.as_bytes());
        assert!(matches!(read_head(&mut reader, 1024).await, Err(HeadError::TooLarge(1024))));
    }
}
