//! Pod self-registration endpoint.
//!
//! A pod announces itself with `POST <register_path>` and a body of
//! `{"uri": "http://host:port"}`. It enters the registry as `Initializing`
//! and joins the rotation once its readiness probe succeeds.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::validation::parse_pod_uri;
use crate::http::server::AppState;
use crate::load_balancer::pod::BackendPod;
use crate::registry::RegistryError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub uri: String,
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("method {0} not allowed, use POST")]
    MethodNotAllowed(Method),

    #[error("request body is empty")]
    EmptyBody,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pod URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RegisterError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegisterError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RegisterError::EmptyBody | RegisterError::Json(_) | RegisterError::InvalidUri { .. } => {
                StatusCode::BAD_REQUEST
            }
            RegisterError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RegisterError::MethodNotAllowed(_) => {
                (status, [(header::ALLOW, "POST")], self.to_string()).into_response()
            }
            RegisterError::Registry(e) => {
                tracing::error!(error = %e, "Pod registered but subscribers failed");
                (status, "Internal Server Error").into_response()
            }
            _ => (status, self.to_string()).into_response(),
        }
    }
}

/// Parse a registration body into a fresh pod.
pub fn parse_registration(body: &[u8]) -> Result<BackendPod, RegisterError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RegisterError::EmptyBody);
    }
    let request: RegisterRequest = serde_json::from_slice(body)?;
    let uri = parse_pod_uri(&request.uri).map_err(|reason| RegisterError::InvalidUri {
        uri: request.uri.clone(),
        reason,
    })?;
    Ok(BackendPod::initializing(uri))
}

pub async fn register(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<BackendPod>, RegisterError> {
    if method != Method::POST {
        tracing::debug!(method = %method, "Registration with wrong method");
        return Err(RegisterError::MethodNotAllowed(method));
    }

    let pod = parse_registration(&body).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected pod registration");
    })?;

    tracing::info!(pod = %pod.uri(), "Registering pod");
    state.registry.add(pod.clone())?;
    Ok(Json(pod))
}
