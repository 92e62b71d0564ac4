//! Round-robin pod rotation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::load_balancer::{pod::BackendPod, LoadBalancer};
use crate::observability::metrics;
use crate::registry::{PodEvent, PodEventContext, PodEventSubscriber, PodRegistry, SubscriberError};

/// Round-robin selector over the pods eligible for traffic.
///
/// The rotation only ever holds pods believed reachable; dead pods are taken
/// out through `RemovePod` events, so `next` never has to skip anything.
#[derive(Debug, Default)]
pub struct RoundRobin {
    rotation: Mutex<VecDeque<BackendPod>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the registry events that keep the rotation in sync.
    pub fn attach(self: &Arc<Self>, registry: &PodRegistry) {
        let subscriber: Arc<dyn PodEventSubscriber> = self.clone();
        registry.subscribe(PodEvent::PodReady, subscriber.clone());
        registry.subscribe(PodEvent::AddPod, subscriber.clone());
        registry.subscribe(PodEvent::RemovePod, subscriber);
    }

    /// Append a pod to the rotation.
    pub fn register(&self, pod: BackendPod) {
        let mut rotation = self.rotation.lock().expect("rotation mutex poisoned");
        tracing::info!(pod = %pod.uri(), "Pod joined rotation");
        rotation.push_back(pod);
        metrics::record_rotation_size(rotation.len());
    }

    /// Remove the first occurrence of a pod, if any.
    pub fn remove(&self, pod: &BackendPod) {
        let mut rotation = self.rotation.lock().expect("rotation mutex poisoned");
        if let Some(index) = rotation.iter().position(|p| p == pod) {
            rotation.remove(index);
            tracing::info!(pod = %pod.uri(), "Pod left rotation");
            metrics::record_rotation_size(rotation.len());
        }
    }

    /// Rotate the head pod to the tail and return it.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<BackendPod> {
        let mut rotation = self.rotation.lock().expect("rotation mutex poisoned");
        let pod = rotation.pop_front()?;
        rotation.push_back(pod.clone());
        Some(pod)
    }

    pub fn contains(&self, pod: &BackendPod) -> bool {
        self.rotation
            .lock()
            .expect("rotation mutex poisoned")
            .contains(pod)
    }

    pub fn len(&self) -> usize {
        self.rotation.lock().expect("rotation mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current rotation order, head first.
    pub fn pods(&self) -> Vec<BackendPod> {
        self.rotation
            .lock()
            .expect("rotation mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_pod(&self) -> Option<BackendPod> {
        self.next()
    }
}

impl PodEventSubscriber for RoundRobin {
    fn id(&self) -> &str {
        "round-robin"
    }

    fn handle_event(&self, context: &PodEventContext) -> Result<(), SubscriberError> {
        match context.event {
            PodEvent::PodReady | PodEvent::AddPod => {
                for pod in context.affected.iter().filter(|p| p.is_alive()) {
                    // Re-registration of a pod already in rotation must not double its share
                    if !self.contains(pod) {
                        self.register(pod.clone());
                    }
                }
            }
            PodEvent::RemovePod => {
                for pod in &context.affected {
                    self.remove(pod);
                }
            }
            PodEvent::UpdatePod => {}
        }
        Ok(())
    }
}
