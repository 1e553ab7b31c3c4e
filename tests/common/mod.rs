//! Shared fixtures: a proxy on an ephemeral port and scripted upstreams.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use basic_auth_proxy::config::{Config, Credentials, Target};
use basic_auth_proxy::{Lifecycle, Proxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestProxy {
    pub addr: SocketAddr,
    pub lifecycle: Lifecycle,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

pub async fn spawn_proxy(upstream: SocketAddr, password: Option<&str>) -> TestProxy {
    let config = Config {
        target: Target {
            host: "127.0.0.1".to_string(),
            port: upstream.port(),
        },
        proxy_port: 0,
        credentials: Credentials::new("admin", password.map(str::to_string)),
    };

    let proxy = Proxy::bind(config).await.unwrap();
    let port = proxy.local_addr().unwrap().port();
    let lifecycle = proxy.lifecycle();
    let handle = tokio::spawn(async move { proxy.run().await });

    TestProxy {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        lifecycle,
        handle,
    }
}

/// An upstream that records every request it receives and answers each
/// connection with `response`, then closes.
pub async fn spawn_upstream(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let (request, _) = read_message(&mut socket).await;
                let _ = tx.send(request);
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// What a [`spawn_holding_upstream`] connection observed.
#[derive(Debug, PartialEq, Eq)]
pub enum UpstreamEvent {
    Request(String),
    /// The proxy closed the connection
    Closed,
    /// Still open after `IO_TIMEOUT`
    StillOpen,
}

/// An upstream that reads one request, answers with `response` (possibly
/// nothing) and then holds the connection, reporting whether the proxy
/// releases it.
pub async fn spawn_holding_upstream(
    response: &'static [u8],
) -> (SocketAddr, mpsc::UnboundedReceiver<UpstreamEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let (request, _) = read_message(&mut socket).await;
                let _ = tx.send(UpstreamEvent::Request(request));
                let _ = socket.write_all(response).await;

                let _ = tx.send(wait_for_close(&mut socket).await);
            });
        }
    });

    (addr, rx)
}

/// Drains `socket` until the peer closes it or `IO_TIMEOUT` passes.
pub async fn wait_for_close(socket: &mut TcpStream) -> UpstreamEvent {
    let mut sink = [0u8; 4096];
    let drained = tokio::time::timeout(IO_TIMEOUT, async {
        loop {
            match socket.read(&mut sink).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    match drained {
        Ok(()) => UpstreamEvent::Closed,
        Err(_) => UpstreamEvent::StillOpen,
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<UpstreamEvent>) -> UpstreamEvent {
    tokio::time::timeout(IO_TIMEOUT * 2, rx.recv())
        .await
        .expect("upstream reported nothing")
        .expect("upstream stopped")
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Reads one HTTP message (head plus `Content-Length` or chunked body).
///
/// Returns the message and any bytes read past its end.
pub async fn read_message(socket: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    loop {
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let total = if is_chunked(&head) {
                find(&buf[end..], b"\r\n0\r\n\r\n").map(|last| end + last + 7)
            } else {
                Some(end + 4 + content_length(&head))
            };
            if let Some(total) = total.filter(|total| buf.len() >= *total) {
                let rest = buf.split_off(total);
                return (String::from_utf8_lossy(&buf).to_string(), rest);
            }
        }

        let n = socket.read(&mut tmp).await.unwrap_or(0);
        if n == 0 {
            return (String::from_utf8_lossy(&buf).to_string(), Vec::new());
        }
        buf.extend_from_slice(&tmp[..n]);
    }
}

/// Sends `request` and reads until the proxy closes the connection.
pub async fn roundtrip(addr: SocketAddr, request: &[u8]) -> String {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(IO_TIMEOUT, client.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();

    String::from_utf8_lossy(&response).to_string()
}

pub async fn next_request(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(IO_TIMEOUT, rx.recv())
        .await
        .expect("upstream saw no request")
        .expect("upstream stopped")
}

/// Value of the first header named `name` in a raw message.
pub fn header<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    message
        .split("\r\n\r\n")
        .next()?
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> usize {
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

fn is_chunked(head: &str) -> bool {
    header(head, "Transfer-Encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
}
