//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, registration path).
    pub listener: ListenerConfig,

    /// Health check and backoff settings.
    pub health_check: HealthCheckConfig,

    /// Reverse-proxy forwarding settings.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Pods registered at startup, e.g. `["http://10.0.0.5:8080"]`.
    pub pods: Vec<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path of the pod registration endpoint. Every other path is forwarded.
    pub register_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            register_path: "/lbregister".to_string(),
        }
    }
}

/// How a pod is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// `GET` the health path, healthy on 2xx.
    #[default]
    Http,
    /// Open a TCP connection to the pod.
    Tcp,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Pause between two health checks of the same pod, in milliseconds.
    pub interval_ms: u64,

    /// Timeout of a single probe, in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Probe flavour.
    pub probe: ProbeKind,

    /// Attempts per health check before a pod is declared dead.
    pub max_tries: u32,

    /// First backoff delay, in milliseconds.
    pub initial_delay_ms: u64,

    /// Upper bound of the backoff delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            probe: ProbeKind::Http,
            max_tries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2,
        }
    }
}

/// Forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Deadline for a pod to answer a forwarded request, in milliseconds.
    pub timeout_ms: u64,

    /// Largest inbound body accepted for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
