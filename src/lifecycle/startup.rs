//! Startup orchestration.
//!
//! Wires registry, rotation and scheduler together in dependency order:
//! subscribers are attached before any pod is added, so no event is missed.

use std::sync::Arc;
use thiserror::Error;

use crate::config::validation::parse_pod_uri;
use crate::config::ProxyConfig;
use crate::health::{probe, HealthScheduler};
use crate::http::HttpServer;
use crate::load_balancer::pod::BackendPod;
use crate::load_balancer::round_robin::RoundRobin;
use crate::registry::{PodRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid pod URI {uri:?}: {reason}")]
    InvalidPod { uri: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The assembled pod-health engine.
pub struct Balancer {
    pub registry: Arc<PodRegistry>,
    pub rotation: Arc<RoundRobin>,
    pub scheduler: HealthScheduler,
}

impl Balancer {
    pub fn new(config: &ProxyConfig) -> Self {
        let registry = Arc::new(PodRegistry::new());

        let rotation = Arc::new(RoundRobin::new());
        rotation.attach(&registry);

        let scheduler = HealthScheduler::new(
            registry.clone(),
            probe::from_config(&config.health_check),
            &config.health_check,
        );
        scheduler.attach();

        Self {
            registry,
            rotation,
            scheduler,
        }
    }

    /// Register pods as `Initializing`; each joins the rotation once ready.
    ///
    /// Must run inside a Tokio runtime.
    pub fn seed(&self, pods: &[String]) -> Result<usize, StartupError> {
        for uri in pods {
            let parsed = parse_pod_uri(uri).map_err(|reason| StartupError::InvalidPod {
                uri: uri.clone(),
                reason,
            })?;
            self.registry.add(BackendPod::initializing(parsed))?;
        }
        if !pods.is_empty() {
            tracing::info!(pods = pods.len(), "Registered configured pods");
        }
        Ok(pods.len())
    }

    pub fn http_server(&self, config: &ProxyConfig) -> HttpServer {
        HttpServer::new(config, self.registry.clone(), self.rotation.clone())
    }
}
