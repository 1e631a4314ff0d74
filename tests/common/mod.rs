//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use upstream_relay::config::{ServiceConfig, UpstreamConfig};
use upstream_relay::context::{CallContext, CorrelationContext};
use upstream_relay::observability::{EventSink, MemorySink};
use upstream_relay::{HttpServer, Shutdown};

/// What the mock upstream answers for one request.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock upstream on an ephemeral port.
///
/// `route` receives the request target (path plus query, e.g.
/// `/posts?userId=1`) and decides the reply.
pub async fn start_mock_upstream<F>(route: F) -> MockUpstream
where
    F: Fn(&str) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let route = Arc::new(route);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let route = route.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let Some(target) = read_request_target(&mut socket).await else {
                            return;
                        };
                        counter.fetch_add(1, Ordering::SeqCst);
                        let reply = route(&target);
                        tokio::time::sleep(reply.delay).await;

                        let reason = match reply.status {
                            200 => "OK",
                            400 => "Bad Request",
                            404 => "Not Found",
                            500 => "Internal Server Error",
                            503 => "Service Unavailable",
                            _ => "Unknown",
                        };
                        let status_text = format!("{} {}", reply.status, reason);
                        write_raw(&mut socket, &status_text, &reply.body).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, hits }
}

async fn write_raw(socket: &mut TcpStream, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request_target(socket: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        head.extend_from_slice(&chunk[..read]);
    }
    let head = String::from_utf8_lossy(&head);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A listener whose accept queue is full, so new connects hang.
pub struct SaturatedListener {
    pub addr: SocketAddr,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

impl SaturatedListener {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Bind with a backlog of one, never accept, and fill the queue.
pub async fn saturated_listener() -> SaturatedListener {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => queued.push(stream),
            _ => break,
        }
    }

    SaturatedListener {
        addr,
        _listener: listener,
        _queued: queued,
    }
}

pub fn upstream_config(base_url: &str, call_timeout_ms: u64) -> UpstreamConfig {
    UpstreamConfig {
        base_url: Some(base_url.to_string()),
        call_timeout_ms,
        ..UpstreamConfig::default()
    }
}

/// A context as the HTTP layer would build it.
pub fn request_context(path: &str) -> CallContext {
    CallContext::for_request(CorrelationContext::for_request("GET", path, "127.0.0.1"))
}

/// A running relay server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the relay against `base_url`, logging to an in-memory sink.
pub async fn start_server(base_url: &str, call_timeout_ms: u64) -> TestServer {
    let mut config = ServiceConfig::default();
    config.upstream = upstream_config(base_url, call_timeout_ms);
    config.listener.bind_address = "127.0.0.1:0".to_string();

    let sink = Arc::new(MemorySink::new());
    let server = HttpServer::with_sink(config, sink.clone() as Arc<dyn EventSink>).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer { addr, sink, shutdown }
}

/// HTTP client for talking to a [`TestServer`].
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
