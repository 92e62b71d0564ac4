//! Backend pod abstraction.
//!
//! # Responsibilities
//! - Represent a single backend pod, identified by its URI
//! - Carry the pod's lifecycle status (Initializing/Alive/Unresponsive/Dead)
//! - Build outbound targets (health path, forwarded path) from the base URI
//!
//! # Design Decisions
//! - Pods are immutable values; a status change yields a new pod
//! - Equality and hashing only look at the URI

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Lifecycle status of a backend pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    /// Registered, readiness not yet confirmed.
    Initializing,
    /// Healthy, expected to receive traffic.
    Alive,
    /// Temporarily failing health checks.
    Unresponsive,
    /// Retries exhausted. Never stored in the registry.
    Dead,
}

impl PodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodStatus::Initializing => "initializing",
            PodStatus::Alive => "alive",
            PodStatus::Unresponsive => "unresponsive",
            PodStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single backend pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendPod {
    uri: Url,
    status: PodStatus,
}

impl BackendPod {
    pub fn new(uri: Url, status: PodStatus) -> Self {
        Self { uri, status }
    }

    /// A freshly registered pod.
    pub fn initializing(uri: Url) -> Self {
        Self::new(uri, PodStatus::Initializing)
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn status(&self) -> PodStatus {
        self.status
    }

    pub fn is_alive(&self) -> bool {
        self.status == PodStatus::Alive
    }

    /// Return a copy of this pod with a new status.
    pub fn with_status(&self, status: PodStatus) -> Self {
        Self {
            uri: self.uri.clone(),
            status,
        }
    }

    /// Join the pod's base URI with an absolute path (and optional query).
    ///
    /// The path is appended verbatim, so `http://pod:80/api` + `/v1?x=1`
    /// yields `http://pod:80/api/v1?x=1`.
    pub fn target(&self, path_and_query: &str) -> String {
        let base = self.uri.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{}{}", base, path_and_query)
        } else {
            format!("{}/{}", base, path_and_query)
        }
    }

    /// `host:port` of the pod, used for transport-level checks.
    pub fn authority(&self) -> Option<String> {
        let host = self.uri.host_str()?;
        let port = self.uri.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }
}

impl PartialEq for BackendPod {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for BackendPod {}

impl Hash for BackendPod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl fmt::Display for BackendPod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.status)
    }
}
