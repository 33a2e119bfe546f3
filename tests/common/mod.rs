//! Shared utilities for integration tests.

#![allow(dead_code)]

use response_tinker::http::HttpService;
use response_tinker::{
    CorrelationKey, EngineContext, ExchangeOutcome, InterceptedMessage, InterceptionEngine,
    TinkerConfig,
};

pub const RESPONSE_OK: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nworld";

/// Engine with default configuration and the Rhai script engine.
pub fn engine() -> InterceptionEngine {
    InterceptionEngine::new(&EngineContext::new(TinkerConfig::default()))
}

pub fn service(url: &str) -> HttpService {
    url.parse().expect("valid service")
}

/// Raw request bytes for `method` on `path` with an optional body.
pub fn raw_request(method: &str, path: &str, host: &str, body: &str) -> Vec<u8> {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: {host}\r\n");
    if !body.is_empty() {
        raw.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
        raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw.into_bytes()
}

/// Drive one full exchange and return its outcome with the outgoing bytes.
pub fn exchange(
    engine: &InterceptionEngine,
    key: u64,
    service: &HttpService,
    request: Vec<u8>,
    response: &[u8],
) -> (ExchangeOutcome, Vec<u8>) {
    let key = CorrelationKey(key);
    engine.on_request(&InterceptedMessage::new(key, service.clone(), request));
    let mut message = InterceptedMessage::new(key, service.clone(), response.to_vec());
    let outcome = engine.on_response(&mut message);
    (outcome, message.bytes)
}

/// Split rebuilt bytes into head lines and body.
pub fn split(bytes: &[u8]) -> (Vec<String>, Vec<u8>) {
    let pos = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("head terminator");
    let head = String::from_utf8_lossy(&bytes[..pos]).into_owned();
    let lines = head.split("\r\n").map(str::to_owned).collect();
    (lines, bytes[pos + 4..].to_vec())
}

pub fn content_lengths(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.split_once(':'))
        .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().to_string())
        .collect()
}
