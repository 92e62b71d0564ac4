//! Liveness probes.
//!
//! # Responsibilities
//! - Issue one liveness check against a single pod
//! - Report success, or `NetworkUnavailable` for anything the backoff loop
//!   should retry (connection error, non-2xx, timeout)

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::{HealthCheckConfig, ProbeKind};
use crate::load_balancer::pod::BackendPod;
use crate::resilience::Retryable;

const USER_AGENT: &str = "podbalancer-health-check";

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The pod could not be reached or answered unhealthy.
    #[error("pod unavailable: {0}")]
    NetworkUnavailable(String),

    /// The probe could not even be built for this pod.
    #[error("invalid probe target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl Retryable for ProbeError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProbeError::NetworkUnavailable(_))
    }
}

/// A single liveness check against one pod.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, pod: &BackendPod) -> Result<(), ProbeError>;
}

/// Build the probe selected by configuration.
pub fn from_config(config: &HealthCheckConfig) -> Arc<dyn Probe> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match config.probe {
        ProbeKind::Http => Arc::new(HttpProbe::new(config.path.clone(), timeout)),
        ProbeKind::Tcp => Arc::new(TcpProbe::new(timeout)),
    }
}

/// `GET <pod><path>`; healthy on any 2xx.
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(path: String, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            path,
            timeout,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, pod: &BackendPod) -> Result<(), ProbeError> {
        let target = pod.target(&self.path);
        let request = Request::builder()
            .method(Method::GET)
            .uri(&target)
            .header("user-agent", USER_AGENT)
            .body(Body::empty())
            .map_err(|e| ProbeError::InvalidTarget {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => {
                tracing::debug!(pod = %pod.uri(), status = %response.status(), "Health check failed: non-success status");
                Err(ProbeError::NetworkUnavailable(format!(
                    "{} answered {}",
                    target,
                    response.status()
                )))
            }
            Ok(Err(e)) => {
                tracing::debug!(pod = %pod.uri(), error = %e, "Health check failed: connection error");
                Err(ProbeError::NetworkUnavailable(e.to_string()))
            }
            Err(_) => {
                tracing::debug!(pod = %pod.uri(), timeout = ?self.timeout, "Health check failed: timeout");
                Err(ProbeError::NetworkUnavailable(format!(
                    "{} timed out after {:?}",
                    target, self.timeout
                )))
            }
        }
    }
}

/// Transport-level check: healthy when a TCP connection can be opened.
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, pod: &BackendPod) -> Result<(), ProbeError> {
        let authority = pod.authority().ok_or_else(|| ProbeError::InvalidTarget {
            target: pod.uri().to_string(),
            reason: "missing host or port".to_string(),
        })?;

        match time::timeout(self.timeout, TcpStream::connect(&authority)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::NetworkUnavailable(format!("{}: {}", authority, e))),
            Err(_) => Err(ProbeError::NetworkUnavailable(format!(
                "{} connect timed out after {:?}",
                authority, self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::pod::PodStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    /// Serve `status` to every connection.
    async fn serve_status(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    /// An address nothing listens on.
    async fn closed_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn pod(uri: &str) -> BackendPod {
        BackendPod::new(Url::parse(uri).unwrap(), PodStatus::Alive)
    }

    #[tokio::test]
    async fn test_http_probe_healthy() {
        let uri = serve_status("200 OK").await;
        let probe = HttpProbe::new("/health".into(), Duration::from_secs(2));
        assert!(probe.probe(&pod(&uri)).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_probe_non_success_is_unavailable() {
        let uri = serve_status("503 Service Unavailable").await;
        let probe = HttpProbe::new("/health".into(), Duration::from_secs(2));

        let err = probe.probe(&pod(&uri)).await.unwrap_err();
        assert!(matches!(err, ProbeError::NetworkUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused_is_unavailable() {
        let uri = closed_addr().await;
        let probe = HttpProbe::new("/health".into(), Duration::from_secs(2));

        let err = probe.probe(&pod(&uri)).await.unwrap_err();
        assert!(matches!(err, ProbeError::NetworkUnavailable(_)));
    }

    #[tokio::test]
    async fn test_http_probe_timeout_is_unavailable() {
        // Accepts but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let probe = HttpProbe::new("/health".into(), Duration::from_millis(100));
        let err = probe.probe(&pod(&format!("http://{}", addr))).await.unwrap_err();
        assert!(matches!(err, ProbeError::NetworkUnavailable(_)));
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let up = serve_status("200 OK").await;
        let down = closed_addr().await;
        let probe = TcpProbe::new(Duration::from_secs(1));

        assert!(probe.probe(&pod(&up)).await.is_ok());
        assert!(matches!(
            probe.probe(&pod(&down)).await,
            Err(ProbeError::NetworkUnavailable(_))
        ));
    }

    #[test]
    fn test_invalid_target_is_not_retryable() {
        let err = ProbeError::InvalidTarget {
            target: "x".into(),
            reason: "y".into(),
        };
        assert!(!err.is_retryable());
    }
}
