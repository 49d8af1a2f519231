//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use tenant_edge::config::{parse_config, EdgeConfig};
use tenant_edge::http::EdgeServer;
use tenant_edge::lifecycle::Shutdown;

pub const BACKEND_SEGMENTS: &str = r#"["accounts", "projects", "llm", "tasks", "NFT", "portal", "mockup", "news", "dashboard", "weight", "admin", "tenant"]"#;

/// A running gateway and the handles a test needs to drive it.
pub struct Edge {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<EdgeConfig>,
}

impl Edge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the gateway on an ephemeral port.
pub async fn spawn_edge(config: EdgeConfig) -> Edge {
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = EdgeServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    Edge {
        addr,
        shutdown,
        config_updates,
    }
}

/// The production site: backend, llm-wrapper and frontend behind two hosts.
pub fn site_config(backend: SocketAddr, wrapper: SocketAddr, frontend: SocketAddr) -> EdgeConfig {
    site_config_with(backend, wrapper, frontend, "")
}

/// Site configuration with extra top-level TOML prepended.
pub fn site_config_with(
    backend: SocketAddr,
    wrapper: SocketAddr,
    frontend: SocketAddr,
    extra: &str,
) -> EdgeConfig {
    parse_config(&format!(
        r#"
        {extra}

        [[hosts]]
        name = "multi-tenant.example"
        tenant = "default"

        [[hosts]]
        name = "nantou.multi-tenant.example"
        tenant = "nantou-gov"

        [[upstreams]]
        name = "backend"
        address = "{backend}"

        [[upstreams]]
        name = "llm-wrapper"
        address = "{wrapper}"

        [[upstreams]]
        name = "frontend"
        address = "{frontend}"

        [policies.standard]

        [policies.streaming]
        read_timeout_secs = 600
        write_timeout_secs = 600
        buffering = false
        extra_headers = {{ "Cache-Control" = "no-cache" }}

        [policies.frontend]
        upgrade = true

        [[routes]]
        name = "backend-direct"
        segments = {segments}
        upstream = "backend"
        policy = "standard"

        [[routes]]
        name = "backend-api"
        path_prefix = "/api"
        segments = {segments}
        strip_prefix = "/api"
        upstream = "backend"
        policy = "standard"

        [[routes]]
        name = "llm-wrapper"
        path_prefix = "/api/"
        upstream = "llm-wrapper"
        policy = "streaming"

        [[routes]]
        name = "frontend"
        upstream = "frontend"
        policy = "frontend"
        "#,
        segments = BACKEND_SEGMENTS,
    ))
    .unwrap()
}

/// HTTP client that never pools or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start an upstream answering every request with a JSON description of
/// what it received.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |request: Request<Body>| async move {
        let headers: BTreeMap<String, String> = request
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap_or_default();

        axum::Json(json!({
            "backend": name,
            "method": method,
            "path": path,
            "query": query,
            "headers": headers,
            "body_len": body.len(),
        }))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start an upstream sending `chunks` as a chunked response, `gap` apart.
pub async fn start_streaming_backend(chunks: &'static [&'static str], gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for (i, chunk) in chunks.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(gap).await;
                    }
                    let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    if socket.write_all(frame.as_bytes()).await.is_err() {
                        return;
                    }
                }
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Start an upstream counting the connections it receives.
pub async fn start_counting_backend(count: Arc<AtomicU32>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let head = read_head(&mut socket).await.to_ascii_lowercase();
                let declared = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|len| len.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body = vec![0u8; declared];
                if socket.read_exact(&mut body).await.is_err() {
                    return;
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start an upstream that switches protocols and then echoes bytes back.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await.to_ascii_lowercase();
                if !head.contains("upgrade: websocket") {
                    let _ = socket
                        .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                        .await;
                    return;
                }
                let switching = "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
                if socket.write_all(switching.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 || socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Read an HTTP head, returning it as text.
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Header value from an echo backend reply.
pub fn echoed_header<'a>(echo: &'a Value, name: &str) -> Option<&'a str> {
    echo["headers"][name].as_str()
}
