//! Response parsing and reconstruction.
//!
//! # Responsibilities
//! - Split a raw response into status line, headers and body
//! - Keep duplicate headers (e.g. several Set-Cookie lines) in order
//! - Drop the original Content-Length; it is recomputed on rebuild
//! - Rebuild wire bytes after a handler has edited the response

use std::sync::OnceLock;

use regex::Regex;

use crate::http::{encode_latin1, head_lines, split_head, split_header, ParseError};

const CONTENT_LENGTH: &str = "Content-Length";

/// A response materialized from its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// The status line exactly as received, e.g. `HTTP/1.1 200 OK`.
    pub status_line: String,
    pub status: u16,
    /// Header lines in wire order, Content-Length excluded.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }
        let (head, body) = split_head(raw);
        let mut lines = head_lines(head).into_iter();
        let status_line = lines.next().unwrap_or_default();

        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ParseError::StatusLine(status_line.clone()))?;

        let headers = lines
            .filter(|l| !l.is_empty())
            .map(|l| split_header(&l))
            .filter(|(name, _)| !name.eq_ignore_ascii_case(CONTENT_LENGTH))
            .collect();

        Ok(Self {
            status_line,
            status,
            headers,
            body: body.to_vec(),
        })
    }

    /// Values of every header named `name`, compared case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize back to wire bytes.
    ///
    /// The first three-digit run of the status line is replaced by `status`,
    /// and a single Content-Length matching the body leads the headers.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.status_line.len() + self.body.len() + 256);

        let status = self.status.to_string();
        let line = status_code_pattern().replace(&self.status_line, status.as_str());
        encode_latin1(&line, &mut out);
        out.extend_from_slice(b"\r\n");

        out.extend_from_slice(format!("{CONTENT_LENGTH}: {}\r\n", self.body.len()).as_bytes());

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                continue;
            }
            encode_latin1(name, &mut out);
            out.extend_from_slice(b": ");
            encode_latin1(value, &mut out);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

fn status_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[0-9]{3}").expect("static pattern is valid"))
}
