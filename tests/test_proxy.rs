//! Tests for request preparation and serialization toward the upstream

use basic_auth_proxy::config::Target;
use basic_auth_proxy::error::ProxyError;
use basic_auth_proxy::http::parser::parse_http_request;
use basic_auth_proxy::http::request::Request;
use basic_auth_proxy::http::writer::serialize_request;
use basic_auth_proxy::proxy::tunnel::validate_upgrade;
use basic_auth_proxy::proxy::upstream::Upstream;

fn request(raw: &str) -> Request {
    parse_http_request(raw.as_bytes()).unwrap().0
}

fn upstream() -> Upstream {
    Upstream::new(Target {
        host: "localhost".to_string(),
        port: 3000,
    })
}

#[test]
fn test_prepare_request_keeps_client_host() {
    let mut request =
        request("GET /teams/jx/projects HTTP/1.1\r\nHost: 127.0.0.1:9007\r\nUser-Agent: Test\r\n\r\n");

    upstream().prepare_request(&mut request);
    let request_str = String::from_utf8(serialize_request(&request)).unwrap();

    assert!(request_str.starts_with("GET /teams/jx/projects HTTP/1.1\r\n"));
    assert!(request_str.contains("Host: 127.0.0.1:9007\r\n"));
    assert!(request_str.contains("User-Agent: Test\r\n"));
    assert!(request_str.contains("Connection: close\r\n"));
    assert!(request_str.ends_with("\r\n\r\n"));
}

#[test]
fn test_prepare_request_fills_missing_host() {
    let mut request = request("GET / HTTP/1.0\r\n\r\n");

    upstream().prepare_request(&mut request);

    assert_eq!(request.header("Host"), Some("localhost:3000"));
}

#[test]
fn test_prepare_request_replaces_keep_alive() {
    let mut request = request("GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n");

    upstream().prepare_request(&mut request);

    assert_eq!(request.header("Connection"), Some("close"));
    assert_eq!(
        request.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("connection")).count(),
        1
    );
}

#[test]
fn test_prepare_request_keeps_upgrade_headers() {
    let mut request = request(
        "GET /ws HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n",
    );

    upstream().prepare_request(&mut request);

    assert_eq!(request.header("Connection"), Some("Upgrade"));
    assert_eq!(request.header("Upgrade"), Some("websocket"));
}

#[test]
fn test_serialize_request_writes_head_only() {
    let request = request(
        "POST /api/data HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
    );

    let bytes = serialize_request(&request);

    assert!(bytes.ends_with(b"Content-Length: 2\r\n\r\n"));
}

#[test]
fn test_serialize_request_keeps_extension_method() {
    let request = request("REPORT /dav/cal HTTP/1.1\r\nDepth: 0\r\n\r\n");

    let request_str = String::from_utf8(serialize_request(&request)).unwrap();
    assert!(request_str.starts_with("REPORT /dav/cal HTTP/1.1\r\n"));
}

#[test]
fn test_validate_upgrade_accepts_websocket_get() {
    let request = request("GET /ws HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: WebSocket\r\n\r\n");

    assert!(validate_upgrade(&request).is_ok());
}

#[test]
fn test_validate_upgrade_rejects_other_methods_and_protocols() {
    let post = request("POST /ws HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n");
    assert!(matches!(
        validate_upgrade(&post),
        Err(ProxyError::MalformedUpgrade(_))
    ));

    let h2c = request("GET / HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: h2c\r\n\r\n");
    assert!(matches!(
        validate_upgrade(&h2c),
        Err(ProxyError::MalformedUpgrade(_))
    ));
}
