//! Registry events and the subscriber contract.

use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

use crate::load_balancer::pod::BackendPod;

/// Kinds of registry mutations observable by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodEvent {
    /// A pod was inserted (or overwritten) by registration.
    AddPod,
    /// A pod left the registry.
    RemovePod,
    /// A pod's status changed.
    UpdatePod,
    /// A pod passed its readiness probe and may receive traffic.
    PodReady,
}

impl PodEvent {
    pub const ALL: [PodEvent; 4] = [
        PodEvent::AddPod,
        PodEvent::RemovePod,
        PodEvent::UpdatePod,
        PodEvent::PodReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PodEvent::AddPod => "add_pod",
            PodEvent::RemovePod => "remove_pod",
            PodEvent::UpdatePod => "update_pod",
            PodEvent::PodReady => "pod_ready",
        }
    }
}

impl fmt::Display for PodEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered with every event.
#[derive(Debug, Clone)]
pub struct PodEventContext {
    pub event: PodEvent,
    pub timestamp: SystemTime,
    /// Pods touched by the mutation, in order. Usually a single pod.
    pub affected: Vec<BackendPod>,
}

impl PodEventContext {
    pub fn new(event: PodEvent, affected: Vec<BackendPod>) -> Self {
        Self {
            event,
            timestamp: SystemTime::now(),
            affected,
        }
    }

    pub fn single(event: PodEvent, pod: BackendPod) -> Self {
        Self::new(event, vec![pod])
    }
}

/// Error raised by a subscriber while handling an event.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("no async runtime available to schedule work: {0}")]
    NoRuntime(String),

    #[error("{0}")]
    Rejected(String),
}

/// Something interested in registry mutations.
///
/// `handle_event` runs on the caller's thread while the registry mutation is
/// in progress, so it must not block. Long-running work belongs in a spawned
/// task.
pub trait PodEventSubscriber: Send + Sync {
    /// Stable identifier; subscribing twice with the same id is a no-op.
    fn id(&self) -> &str;

    fn handle_event(&self, context: &PodEventContext) -> Result<(), SubscriberError>;
}
