//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use axum::http::StatusCode;
use podbalancer::config::ProxyConfig;
use podbalancer::lifecycle::{Balancer, Shutdown};

/// A request as seen by a mock pod.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned reply of a mock pod: status, extra headers, body.
pub type MockReply = (u16, Vec<(String, String)>, String);

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Start a programmable mock pod on an ephemeral port.
pub async fn start_programmable_pod<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, headers, body) = f(request).await;
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");

                let mut response = format!("HTTP/1.1 {} {}\r\n", status, reason);
                for (name, value) in headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                ));
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A pod with a switchable `/health` endpoint that echoes other requests.
///
/// Echo body: `name|METHOD|path-and-query|body`. The names of the headers
/// it received are returned in `x-seen-headers`.
#[derive(Clone)]
pub struct MockPod {
    pub addr: SocketAddr,
    pub name: String,
    healthy: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
}

impl MockPod {
    pub async fn start(name: &str) -> Self {
        let healthy = Arc::new(AtomicBool::new(true));
        let hits = Arc::new(AtomicUsize::new(0));

        let (h, c, n) = (healthy.clone(), hits.clone(), name.to_string());
        let addr = start_programmable_pod(move |req: MockRequest| {
            let (h, c, n) = (h.clone(), c.clone(), n.clone());
            async move {
                if req.path == "/health" {
                    let status = if h.load(Ordering::SeqCst) { 200 } else { 503 };
                    return (status, vec![], String::new());
                }
                c.fetch_add(1, Ordering::SeqCst);
                let seen = req
                    .headers
                    .iter()
                    .map(|(k, _)| k.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                (
                    200,
                    vec![
                        ("x-pod".to_string(), n.clone()),
                        ("x-seen-headers".to_string(), seen),
                        ("keep-alive".to_string(), "timeout=5".to_string()),
                    ],
                    format!("{}|{}|{}|{}", n, req.method, req.path, req.body),
                )
            }
        })
        .await;

        Self {
            addr,
            name: name.to_string(),
            healthy,
            hits,
        }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&self.uri()).unwrap()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Forwarded (non-health) requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Settings that keep health checks and retries fast.
pub fn fast_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.health_check.interval_ms = 100;
    config.health_check.timeout_ms = 200;
    config.health_check.max_tries = 3;
    config.health_check.initial_delay_ms = 50;
    config.health_check.max_delay_ms = 100;
    config.forwarding.timeout_ms = 500;
    config
}

/// A balancer serving on an ephemeral port.
pub struct TestBalancer {
    pub addr: SocketAddr,
    pub balancer: Balancer,
    pub shutdown: Shutdown,
}

impl TestBalancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.balancer.scheduler.shutdown().await;
    }
}

pub async fn start_balancer(config: ProxyConfig) -> TestBalancer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let balancer = Balancer::new(&config);
    balancer.scheduler.start();

    let shutdown = Shutdown::new();
    let server = balancer.http_server(&config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestBalancer {
        addr,
        balancer,
        shutdown,
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// A client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
