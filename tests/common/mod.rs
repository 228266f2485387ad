//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use gofr::config::ProxyConfig;
use gofr::lifecycle::Shutdown;
use gofr::proxy::Frontend;
use gofr::HttpServer;

/// Starts a mock backend that answers every request with a fixed body.
/// Returns the address it listens on.
#[allow(dead_code)]
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        read_head(&mut socket).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// A parsed raw HTTP response.
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Issues a GET over a raw socket. Unlike an HTTP client, this sends the
/// target exactly as written, so messy paths reach the server unnormalized.
pub async fn raw_get(addr: SocketAddr, host: &str, target: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).to_string();

    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((&text, ""));
    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

/// A frontend + control listener serving on ephemeral ports.
pub struct TestProxy {
    pub http_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
}

/// Builds the servers around an already-registered frontend and runs them
/// until the returned handle's shutdown is triggered.
pub async fn start_proxy(frontend: Frontend, ping_delay: Duration) -> TestProxy {
    let config = ProxyConfig::default();
    let server = HttpServer::with_frontend(frontend, &config);
    let frontend = server.frontend();
    let shutdown = Arc::new(Shutdown::new());

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    let control_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control_addr = control_listener.local_addr().unwrap();

    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let _ = server.run(http_listener, &shutdown).await;
        });
    }
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let _ = frontend
                .serve_backends(control_listener, ping_delay, &shutdown)
                .await;
        });
    }

    // Both listeners are bound before the tasks start; give the accept
    // loops a beat to come up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestProxy {
        http_addr,
        control_addr,
        shutdown,
    }
}

/// Polls the debug listing until it satisfies `check` or the deadline
/// passes.
pub async fn wait_for_listing<F>(http_addr: SocketAddr, mut check: F) -> bool
where
    F: FnMut(&str) -> bool,
{
    for _ in 0..100 {
        let resp = raw_get(http_addr, "localhost", "/__backends").await;
        if check(&resp.body) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
