//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (durations > 0, delays ordered)
//! - Check addresses and pod URIs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health_check.max_delay_ms ({max}) is below initial_delay_ms ({initial})")]
    DelayOrder { initial: u64, max: u64 },

    #[error("{field} must start with '/', got {value:?}")]
    RelativePath { field: &'static str, value: String },

    #[error("{field} is not a socket address: {value:?}")]
    Address { field: &'static str, value: String },

    #[error("pod URI {value:?} is invalid: {reason}")]
    PodUri { value: String, reason: String },
}

/// Parse a pod URI, accepting only absolute plain-http URLs with a host.
pub fn parse_pod_uri(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let health = &config.health_check;

    for (field, value) in [
        ("health_check.interval_ms", health.interval_ms),
        ("health_check.timeout_ms", health.timeout_ms),
        ("health_check.max_tries", u64::from(health.max_tries)),
        ("health_check.initial_delay_ms", health.initial_delay_ms),
        ("health_check.backoff_factor", u64::from(health.backoff_factor)),
        ("forwarding.timeout_ms", config.forwarding.timeout_ms),
        ("forwarding.max_body_bytes", config.forwarding.max_body_bytes as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if health.max_delay_ms < health.initial_delay_ms {
        errors.push(ValidationError::DelayOrder {
            initial: health.initial_delay_ms,
            max: health.max_delay_ms,
        });
    }

    for (field, value) in [
        ("health_check.path", &health.path),
        ("listener.register_path", &config.listener.register_path),
    ] {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }

    let mut addresses = vec![("listener.bind_address", &config.listener.bind_address)];
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::Address {
                field,
                value: value.clone(),
            });
        }
    }

    for pod in &config.pods {
        if let Err(reason) = parse_pod_uri(pod) {
            errors.push(ValidationError::PodUri {
                value: pod.clone(),
                reason,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
