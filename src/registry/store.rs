//! In-memory pod store with event publication.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use url::Url;

use crate::load_balancer::pod::{BackendPod, PodStatus};
use crate::observability::metrics;
use crate::registry::events::{PodEvent, PodEventContext, PodEventSubscriber, SubscriberError};

/// Error returned by registry mutations.
///
/// The mutation has always been applied when this is returned; only the
/// notification of one or more subscribers failed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{} subscriber(s) failed while handling {event}: {}", .failures.len(), describe(.failures))]
    Subscriber {
        event: PodEvent,
        failures: Vec<(String, SubscriberError)>,
    },
}

fn describe(failures: &[(String, SubscriberError)]) -> String {
    failures
        .iter()
        .map(|(id, e)| format!("{}: {}", id, e))
        .collect::<Vec<_>>()
        .join(", ")
}

type SubscriberTable = HashMap<PodEvent, HashMap<String, Arc<dyn PodEventSubscriber>>>;

/// Authoritative store of all known pods.
#[derive(Default)]
pub struct PodRegistry {
    pods: DashMap<Url, BackendPod>,
    subscribers: RwLock<SubscriberTable>,
}

impl std::fmt::Debug for PodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodRegistry")
            .field("pods", &self.pods.len())
            .finish()
    }
}

impl PodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<BackendPod> {
        self.pods.get(uri).map(|entry| entry.value().clone())
    }

    /// Snapshot of every pod currently registered.
    pub fn get_all(&self) -> Vec<BackendPod> {
        self.pods.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Insert or overwrite a pod and publish `AddPod`.
    pub fn add(&self, pod: BackendPod) -> Result<(), RegistryError> {
        tracing::info!(pod = %pod.uri(), status = %pod.status(), "Pod added");
        self.pods.insert(pod.uri().clone(), pod.clone());
        metrics::record_registered_pods(self.pods.len());
        self.publish(PodEventContext::single(PodEvent::AddPod, pod))
    }

    /// Store a status change and publish `UpdatePod`.
    ///
    /// A pod updated to `Dead` is removed instead.
    pub fn update(&self, pod: BackendPod) -> Result<(), RegistryError> {
        metrics::record_pod_transition(pod.status());
        if pod.status() == PodStatus::Dead {
            return self.remove(pod.uri());
        }

        tracing::debug!(pod = %pod.uri(), status = %pod.status(), "Pod updated");
        self.pods.insert(pod.uri().clone(), pod.clone());
        self.publish(PodEventContext::single(PodEvent::UpdatePod, pod))
    }

    /// Remove a pod and publish `RemovePod` with its last known value.
    pub fn remove(&self, uri: &Url) -> Result<(), RegistryError> {
        let Some((_, pod)) = self.pods.remove(uri) else {
            return Ok(());
        };

        tracing::info!(pod = %uri, "Pod removed");
        metrics::record_registered_pods(self.pods.len());
        self.publish(PodEventContext::single(PodEvent::RemovePod, pod))
    }

    /// Store the pod and publish `PodReady`.
    pub fn make_ready(&self, pod: BackendPod) -> Result<(), RegistryError> {
        tracing::info!(pod = %pod.uri(), "Pod ready");
        metrics::record_pod_transition(pod.status());
        self.pods.insert(pod.uri().clone(), pod.clone());
        self.publish(PodEventContext::single(PodEvent::PodReady, pod))
    }

    pub fn subscribe(&self, event: PodEvent, subscriber: Arc<dyn PodEventSubscriber>) {
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        table
            .entry(event)
            .or_default()
            .insert(subscriber.id().to_string(), subscriber);
    }

    pub fn unsubscribe(&self, event: PodEvent, subscriber_id: &str) {
        let mut table = self.subscribers.write().expect("subscriber table poisoned");
        if let Some(set) = table.get_mut(&event) {
            set.remove(subscriber_id);
        }
    }

    pub fn subscriber_count(&self, event: PodEvent) -> usize {
        let table = self.subscribers.read().expect("subscriber table poisoned");
        table.get(&event).map_or(0, |set| set.len())
    }

    /// Deliver an event to every subscriber of its kind.
    ///
    /// Delivery continues past failing subscribers; all failures are logged
    /// and returned together.
    pub fn publish(&self, context: PodEventContext) -> Result<(), RegistryError> {
        // Clone the targets so subscribers may (un)subscribe from inside handle_event.
        let targets: Vec<Arc<dyn PodEventSubscriber>> = {
            let table = self.subscribers.read().expect("subscriber table poisoned");
            match table.get(&context.event) {
                Some(set) => set.values().cloned().collect(),
                None => return Ok(()),
            }
        };

        let mut failures = Vec::new();
        for subscriber in targets {
            if let Err(e) = subscriber.handle_event(&context) {
                tracing::warn!(
                    subscriber = subscriber.id(),
                    event = %context.event,
                    error = %e,
                    "Subscriber failed to handle pod event"
                );
                failures.push((subscriber.id().to_string(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Subscriber {
                event: context.event,
                failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event it sees.
    struct Recorder {
        id: String,
        seen: Mutex<Vec<(PodEvent, Vec<BackendPod>)>>,
    }

    impl Recorder {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<PodEvent> {
            self.seen.lock().unwrap().iter().map(|(e, _)| *e).collect()
        }
    }

    impl PodEventSubscriber for Recorder {
        fn id(&self) -> &str {
            &self.id
        }

        fn handle_event(&self, context: &PodEventContext) -> Result<(), SubscriberError> {
            self.seen
                .lock()
                .unwrap()
                .push((context.event, context.affected.clone()));
            Ok(())
        }
    }

    struct Failing;

    impl PodEventSubscriber for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn handle_event(&self, _context: &PodEventContext) -> Result<(), SubscriberError> {
            Err(SubscriberError::Rejected("boom".into()))
        }
    }

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn subscribe_all(registry: &PodRegistry, subscriber: Arc<dyn PodEventSubscriber>) {
        for event in PodEvent::ALL {
            registry.subscribe(event, subscriber.clone());
        }
    }

    #[test]
    fn test_get_reflects_last_write() {
        let registry = PodRegistry::new();
        let a = BackendPod::initializing(uri("http://a"));

        assert!(registry.get(a.uri()).is_none());

        registry.add(a.clone()).unwrap();
        registry.update(a.with_status(PodStatus::Alive)).unwrap();
        registry.update(a.with_status(PodStatus::Unresponsive)).unwrap();

        let stored = registry.get(a.uri()).unwrap();
        assert_eq!(stored.status(), PodStatus::Unresponsive);
        assert_eq!(registry.get_all().len(), 1);
    }

    #[test]
    fn test_update_dead_is_remove() {
        let registry = PodRegistry::new();
        let recorder = Recorder::new("rec");
        subscribe_all(&registry, recorder.clone());

        let b = BackendPod::new(uri("http://b"), PodStatus::Alive);
        registry.add(b.clone()).unwrap();
        registry.update(b.with_status(PodStatus::Dead)).unwrap();

        assert!(registry.get(b.uri()).is_none());
        assert!(registry.is_empty());
        assert_eq!(recorder.events(), vec![PodEvent::AddPod, PodEvent::RemovePod]);

        // The removal carries the pre-removal value, not the Dead one
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[1].1[0].status(), PodStatus::Alive);
    }

    #[test]
    fn test_one_event_per_mutation() {
        let registry = PodRegistry::new();
        let recorder = Recorder::new("rec");
        subscribe_all(&registry, recorder.clone());

        let c = BackendPod::initializing(uri("http://c"));
        registry.add(c.clone()).unwrap();
        registry.make_ready(c.with_status(PodStatus::Alive)).unwrap();
        registry.update(c.with_status(PodStatus::Unresponsive)).unwrap();
        registry.remove(c.uri()).unwrap();
        // Removing an absent pod publishes nothing
        registry.remove(c.uri()).unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                PodEvent::AddPod,
                PodEvent::PodReady,
                PodEvent::UpdatePod,
                PodEvent::RemovePod
            ]
        );
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = PodRegistry::new();
        let recorder = Recorder::new("rec");

        registry.subscribe(PodEvent::AddPod, recorder.clone());
        registry.subscribe(PodEvent::AddPod, recorder.clone());
        assert_eq!(registry.subscriber_count(PodEvent::AddPod), 1);

        registry.add(BackendPod::initializing(uri("http://d"))).unwrap();
        assert_eq!(recorder.events().len(), 1);

        registry.unsubscribe(PodEvent::AddPod, "rec");
        registry.unsubscribe(PodEvent::AddPod, "rec");
        registry.unsubscribe(PodEvent::RemovePod, "unknown");
        assert_eq!(registry.subscriber_count(PodEvent::AddPod), 0);

        registry.add(BackendPod::initializing(uri("http://e"))).unwrap();
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_only_subscribed_kinds_are_delivered() {
        let registry = PodRegistry::new();
        let recorder = Recorder::new("rec");
        registry.subscribe(PodEvent::RemovePod, recorder.clone());

        let f = BackendPod::new(uri("http://f"), PodStatus::Alive);
        registry.add(f.clone()).unwrap();
        registry.update(f.with_status(PodStatus::Unresponsive)).unwrap();
        registry.remove(f.uri()).unwrap();

        assert_eq!(recorder.events(), vec![PodEvent::RemovePod]);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let registry = PodRegistry::new();
        let recorder = Recorder::new("rec");
        registry.subscribe(PodEvent::AddPod, Arc::new(Failing));
        registry.subscribe(PodEvent::AddPod, recorder.clone());

        let g = BackendPod::initializing(uri("http://g"));
        let err = registry.add(g.clone()).unwrap_err();

        match err {
            RegistryError::Subscriber { event, failures } => {
                assert_eq!(event, PodEvent::AddPod);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "failing");
            }
        }
        // Mutation applied and the healthy subscriber still notified
        assert!(registry.get(g.uri()).is_some());
        assert_eq!(recorder.events(), vec![PodEvent::AddPod]);
    }
}
