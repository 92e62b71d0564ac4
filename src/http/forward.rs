//! Reverse-proxy forwarding of inbound requests to the next pod.

use axum::{
    body::{self, Body},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time;
use url::Url;

use crate::http::headers;
use crate::http::server::{AppState, X_REQUEST_ID};
use crate::observability::metrics;

/// Failure to serve a request through a pod.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no backend available")]
    NoBackend,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("cannot build request for {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("pod {pod} did not answer within {timeout:?}")]
    Timeout { pod: Url, timeout: Duration },

    #[error("request to pod {pod} failed: {source}")]
    Upstream {
        pod: Url,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("reading response from pod {pod} failed: {source}")]
    ResponseBody {
        pod: Url,
        #[source]
        source: axum::Error,
    },
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::NoBackend => StatusCode::SERVICE_UNAVAILABLE,
            ForwardError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ForwardError::InvalidTarget { .. }
            | ForwardError::Timeout { .. }
            | ForwardError::Upstream { .. }
            | ForwardError::ResponseBody { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let body = match self {
            ForwardError::NoBackend => "No backend available",
            ForwardError::PayloadTooLarge { .. } => "Payload Too Large",
            _ => "Internal Server Error",
        };
        (self.status(), body).into_response()
    }
}

/// Fallback handler: every path other than the registration endpoint.
pub async fn forward(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = match proxy(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() && !matches!(e, ForwardError::NoBackend) {
                tracing::error!(request_id = %request_id, error = %e, "Forwarding failed");
            } else {
                tracing::warn!(request_id = %request_id, error = %e, "Request rejected");
            }
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

async fn proxy(state: &AppState, request: Request<Body>) -> Result<Response, ForwardError> {
    let pod = state.balancer.next_pod().ok_or(ForwardError::NoBackend)?;

    let limit = state.forwarding.max_body_bytes;
    let (parts, inbound_body) = request.into_parts();
    let declared = parts
        .headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ForwardError::PayloadTooLarge { limit });
    }
    // Undeclared (chunked) bodies are capped while reading.
    let payload = body::to_bytes(inbound_body, limit)
        .await
        .map_err(|_| ForwardError::PayloadTooLarge { limit })?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = pod.target(path_and_query);

    let mut builder = Request::builder().method(parts.method.clone()).uri(&target);
    if let Some(outbound) = builder.headers_mut() {
        *outbound = headers::outbound_request_headers(&parts.headers);
    }
    let outbound = builder
        .body(Body::from(payload))
        .map_err(|e| ForwardError::InvalidTarget {
            target: target.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!(
        method = %parts.method,
        pod = %pod.uri(),
        target = %target,
        "Forwarding request"
    );

    let timeout = Duration::from_millis(state.forwarding.timeout_ms);
    let exchange = async {
        let response = state
            .client
            .request(outbound)
            .await
            .map_err(|source| ForwardError::Upstream {
                pod: pod.uri().clone(),
                source,
            })?;
        let (parts, incoming) = response.into_parts();
        let bytes = body::to_bytes(Body::new(incoming), usize::MAX)
            .await
            .map_err(|source| ForwardError::ResponseBody {
                pod: pod.uri().clone(),
                source,
            })?;
        Ok::<_, ForwardError>((parts, bytes))
    };

    let (upstream, bytes) = time::timeout(timeout, exchange)
        .await
        .map_err(|_| ForwardError::Timeout {
            pod: pod.uri().clone(),
            timeout,
        })??;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers::relayed_response_headers(&upstream.headers);
    Ok(response)
}
