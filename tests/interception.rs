//! End-to-end exchanges through the interception engine.

use std::sync::Arc;
use std::thread;

use response_tinker::{CorrelationKey, ExchangeOutcome, InterceptedMessage, PassthroughReason};

mod common;

use common::{content_lengths, engine, exchange, raw_request, service, split, RESPONSE_OK};

#[test]
fn test_literal_lookup_by_exact_url() {
    let engine = engine();
    let routes = engine.routes();
    routes
        .register_route("https://example.com/a", "fn do_GET(req, rsp) { rsp.body = \"a\"; }")
        .unwrap();
    routes
        .register_route("https://example.com/b", "fn do_GET(req, rsp) { rsp.body = \"b\"; }")
        .unwrap();

    let a = routes.lookup("https://example.com/a").unwrap();
    let b = routes.lookup("https://example.com/b").unwrap();
    assert_eq!(a.identity().to_string(), "https://example.com/a");
    assert_eq!(b.identity().to_string(), "https://example.com/b");
    assert!(routes.lookup("https://example.com/c").is_none());
}

#[test]
fn test_default_port_normalization() {
    let engine = engine();
    let routes = engine.routes();
    routes
        .register_route("https://example.com/path", "fn do_GET(req, rsp) {}")
        .unwrap();
    routes
        .register_route("http://example.com/path", "fn do_GET(req, rsp) {}")
        .unwrap();

    let tls = routes.lookup("https://example.com:443/path").unwrap();
    assert_eq!(tls.identity().to_string(), "https://example.com/path");
    let plain = routes.lookup("http://example.com:80/path").unwrap();
    assert_eq!(plain.identity().to_string(), "http://example.com/path");

    assert!(routes.lookup("https://example.com:8443/path").is_none());
    assert!(routes.lookup("http://example.com:443/path").is_none());
}

#[test]
fn test_case_insensitive_pattern() {
    let engine = engine();
    engine
        .routes()
        .register_route(r"/^https://a\.com/.*$/i", "fn do_GET(req, rsp) { rsp.status = 204; }")
        .unwrap();

    assert!(engine.routes().lookup("https://A.COM/x").is_some());
    assert!(engine.routes().lookup("https://b.com/x").is_none());

    let (outcome, bytes) = exchange(
        &engine,
        1,
        &service("https://a.com"),
        raw_request("GET", "/x", "a.com", ""),
        RESPONSE_OK,
    );
    assert_eq!(outcome, ExchangeOutcome::Handled);
    assert!(bytes.starts_with(b"HTTP/1.1 204 OK\r\n"));
}

#[test]
fn test_reregistration_replaces_logic() {
    let engine = engine();
    let svc = service("https://example.com");
    engine
        .routes()
        .register_route("https://example.com/p", "fn do_GET(req, rsp) { rsp.body = \"old\"; }")
        .unwrap();
    engine
        .routes()
        .register_route("https://example.com/p", "fn do_GET(req, rsp) { rsp.body = \"new\"; }")
        .unwrap();
    assert_eq!(engine.routes().len(), 1);

    let (_, bytes) = exchange(&engine, 1, &svc, raw_request("GET", "/p", "example.com", ""), RESPONSE_OK);
    let (_, body) = split(&bytes);
    assert_eq!(body, b"new");
}

#[test]
fn test_pending_request_consumed_once() {
    let engine = engine();
    let svc = service("https://example.com");
    engine
        .routes()
        .register_route("https://example.com/p", "fn do_GET(req, rsp) { rsp.status = 500; }")
        .unwrap();

    let (first, _) = exchange(&engine, 3, &svc, raw_request("GET", "/p", "example.com", ""), RESPONSE_OK);
    assert_eq!(first, ExchangeOutcome::Handled);

    let mut again = InterceptedMessage::new(CorrelationKey(3), svc, RESPONSE_OK.to_vec());
    assert_eq!(
        engine.on_response(&mut again),
        ExchangeOutcome::Passthrough(PassthroughReason::CorrelationMiss)
    );
    assert_eq!(again.bytes, RESPONSE_OK);
}

#[test]
fn test_correlation_miss_is_byte_identical() {
    let engine = engine();
    engine
        .routes()
        .register_route("/.*/", "fn do_GET(req, rsp) { rsp.status = 500; }")
        .unwrap();

    let mut message =
        InterceptedMessage::new(CorrelationKey(42), service("https://example.com"), RESPONSE_OK.to_vec());
    let outcome = engine.on_response(&mut message);
    assert_eq!(outcome, ExchangeOutcome::Passthrough(PassthroughReason::CorrelationMiss));
    assert_eq!(message.bytes, RESPONSE_OK);
}

#[test]
fn test_handler_rewrites_status_and_body() {
    let engine = engine();
    engine
        .routes()
        .register_route(
            "https://example.com/greet",
            "fn do_GET(req, rsp) { rsp.status = 202; rsp.body = \"hello\"; }",
        )
        .unwrap();

    let (outcome, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("GET", "/greet", "example.com", ""),
        RESPONSE_OK,
    );
    assert!(outcome.is_handled());

    let (lines, body) = split(&bytes);
    assert!(lines[0].contains("202"));
    assert_eq!(content_lengths(&lines), vec!["5".to_string()]);
    assert_eq!(body, b"hello");
}

#[test]
fn test_failing_handler_passes_through() {
    let engine = engine();
    engine
        .routes()
        .register_route(
            "https://example.com/form",
            "fn do_POST(req, rsp) { rsp.status = 500; throw \"boom\"; }",
        )
        .unwrap();

    let (outcome, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("POST", "/form", "example.com", "a=1"),
        RESPONSE_OK,
    );
    assert_eq!(outcome, ExchangeOutcome::Passthrough(PassthroughReason::HandlerFailed));
    assert_eq!(bytes, RESPONSE_OK);
}

#[test]
fn test_single_content_length_matches_body() {
    let engine = engine();
    engine
        .routes()
        .register_route(
            "https://example.com/len",
            r#"fn do_GET(req, rsp) {
                rsp.headers.push(["Content-Length", "999"]);
                rsp.body = rsp.body + "!!";
            }"#,
        )
        .unwrap();

    let (_, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("GET", "/len", "example.com", ""),
        RESPONSE_OK,
    );
    let (lines, body) = split(&bytes);
    assert_eq!(body, b"world!!");
    assert_eq!(content_lengths(&lines), vec![body.len().to_string()]);
}

#[test]
fn test_duplicate_headers_keep_order() {
    let engine = engine();
    engine
        .routes()
        .register_route("https://example.com/c", "fn do_GET(req, rsp) { rsp.status = 201; }")
        .unwrap();

    let response = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nContent-Length: 2\r\nX-Mid: y\r\nSet-Cookie: b=2\r\n\r\nok";
    let (_, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("GET", "/c", "example.com", ""),
        response,
    );
    let (lines, body) = split(&bytes);
    assert_eq!(
        lines,
        vec![
            "HTTP/1.1 201 OK",
            "Content-Length: 2",
            "Set-Cookie: a=1",
            "X-Mid: y",
            "Set-Cookie: b=2",
        ]
    );
    assert_eq!(body, b"ok");
}

#[test]
fn test_request_view_reaches_handler() {
    let engine = engine();
    engine
        .routes()
        .register_route(
            "https://example.com/echo?q=x",
            r#"fn do_POST(req, rsp) {
                rsp.body = req.method + " " + req.url + " " + req.parameters["q"] + req.parameters["a"];
            }"#,
        )
        .unwrap();

    let (outcome, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("POST", "/echo?q=x", "example.com", "a=1"),
        RESPONSE_OK,
    );
    assert_eq!(outcome, ExchangeOutcome::Handled);
    let (_, body) = split(&bytes);
    assert_eq!(body, b"POST https://example.com:443/echo?q=x x1");
}

#[test]
fn test_literal_route_includes_query() {
    let engine = engine();
    engine
        .routes()
        .register_route("https://example.com/echo", "fn do_GET(req, rsp) { rsp.status = 500; }")
        .unwrap();

    let (outcome, bytes) = exchange(
        &engine,
        1,
        &service("https://example.com"),
        raw_request("GET", "/echo?q=x", "example.com", ""),
        RESPONSE_OK,
    );
    assert_eq!(outcome, ExchangeOutcome::Passthrough(PassthroughReason::NoRoute));
    assert_eq!(bytes, RESPONSE_OK);
}

#[test]
fn test_disable_and_enable() {
    let engine = engine();
    let svc = service("https://example.com");
    engine
        .routes()
        .register_route("https://example.com/p", "fn do_GET(req, rsp) { rsp.status = 500; }")
        .unwrap();

    engine.disable();
    let (outcome, bytes) = exchange(&engine, 1, &svc, raw_request("GET", "/p", "example.com", ""), RESPONSE_OK);
    assert_eq!(outcome, ExchangeOutcome::Passthrough(PassthroughReason::Disabled));
    assert_eq!(bytes, RESPONSE_OK);
    assert!(engine.pending().is_empty());

    engine.enable();
    let (outcome, _) = exchange(&engine, 2, &svc, raw_request("GET", "/p", "example.com", ""), RESPONSE_OK);
    assert!(outcome.is_handled());
}

#[test]
fn test_concurrent_registration_and_exchanges() {
    let engine = Arc::new(engine());
    let svc = service("https://example.com");

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let svc = svc.clone();
            thread::spawn(move || {
                for i in 0..25u64 {
                    let route = format!("https://example.com/t{t}");
                    let source = format!("fn do_GET(req, rsp) {{ rsp.body = \"{t}-{i}\"; }}");
                    engine.routes().register_route(&route, &source).unwrap();

                    let key = t * 1000 + i;
                    let (outcome, bytes) = exchange(
                        &engine,
                        key,
                        &svc,
                        raw_request("GET", &format!("/t{t}"), "example.com", ""),
                        RESPONSE_OK,
                    );
                    assert!(outcome.is_handled());
                    let (_, body) = split(&bytes);
                    assert_eq!(body, format!("{t}-{i}").into_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.routes().len(), 8);
    assert!(engine.pending().is_empty());
}
