//! Raw HTTP message handling.
//!
//! # Data Flow
//! ```text
//! stored request bytes + HttpService
//!     → request.rs (method, URL, headers, parameters)
//!
//! response bytes from the host
//!     → response.rs (status line, ordered headers, body)
//!     → [handler edits status / headers / body]
//!     → response.rs (rebuild with fresh Content-Length)
//!     → replacement bytes for the host
//! ```
//!
//! # Design Decisions
//! - Messages arrive as complete byte buffers; nothing here streams
//! - Header text is decoded byte-per-char so untouched headers round-trip
//! - Parsed views are rebuilt per exchange and never cached

pub mod request;
pub mod response;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use request::{ParamKind, Parameter, ParsedRequest};
pub use response::ParsedResponse;

/// Errors raised while parsing raw HTTP messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message is empty")]
    Empty,

    #[error("malformed request line: {0}")]
    RequestLine(String),

    #[error("malformed status line: {0}")]
    StatusLine(String),

    #[error("invalid service descriptor: {0}")]
    Service(String),
}

/// Scheme, host and port of the server a message was exchanged with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpService {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl HttpService {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            host: host.into(),
            port,
        }
    }

    /// Port implied by the scheme when none is written.
    pub fn default_port(scheme: &str) -> Option<u16> {
        match scheme {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        }
    }
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for HttpService {
    type Err = ParseError;

    /// Parse `scheme://host[:port]`, filling in the scheme's default port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s).map_err(|e| ParseError::Service(format!("{s}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ParseError::Service(format!("{s}: missing host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ParseError::Service(format!("{s}: missing port")))?;
        Ok(Self::new(url.scheme(), host, port))
    }
}

/// Split a message at the blank line ending its head.
///
/// Returns the head (without the terminator) and the body. A message with no
/// blank line is all head.
pub(crate) fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let crlf = find(raw, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find(raw, b"\n\n").map(|pos| (pos, 2));
    let terminator = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    };
    match terminator {
        Some((pos, len)) => (&raw[..pos], &raw[pos + len..]),
        None => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Head lines, decoded one char per byte, with line endings stripped.
pub(crate) fn head_lines(head: &[u8]) -> Vec<String> {
    head.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .map(decode_latin1)
        .collect()
}

/// Split a header line into name and value at the first colon.
pub(crate) fn split_header(line: &str) -> (String, String) {
    match line.split_once(':') {
        Some((name, value)) => (name.to_string(), value.trim_start().to_string()),
        None => (line.to_string(), String::new()),
    }
}

pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`decode_latin1`]; chars beyond one byte are written as UTF-8.
pub(crate) fn encode_latin1(text: &str, out: &mut Vec<u8>) {
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => out.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
