//! Per-pod health check scheduling.
//!
//! # Responsibilities
//! - Keep exactly one prober task running per monitored pod
//! - Drive probe + backoff and write status transitions to the registry
//! - Bring freshly registered pods into rotation once they answer
//! - React to registry events (new or revived pods get a prober)
//!
//! # Design Decisions
//! - Task handles live in a map of per-pod async slots; replacing a task
//!   cancels the old one and waits for it to exit while holding the slot
//! - `stop()` is cooperative: running tasks notice it at their next loop
//!   check. `shutdown()` also cancels them.
//! - Cancellation is never recorded as a status change

use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::health::probe::{Probe, ProbeError};
use crate::load_balancer::pod::{BackendPod, PodStatus};
use crate::registry::{PodEvent, PodEventContext, PodEventSubscriber, PodRegistry, SubscriberError};
use crate::resilience::{Backoff, BackoffError, BackoffPolicy, Outcome};

/// Result of one full health check (probe plus retries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResponse {
    pub content: String,
    pub status: PodStatus,
    pub timestamp: SystemTime,
}

impl HealthCheckResponse {
    fn success() -> Self {
        Self {
            content: "success".to_string(),
            status: PodStatus::Alive,
            timestamp: SystemTime::now(),
        }
    }

    fn dead() -> Self {
        Self {
            content: "dead".to_string(),
            status: PodStatus::Dead,
            timestamp: SystemTime::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("health check cancelled")]
    Cancelled,

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl From<BackoffError<ProbeError>> for HealthCheckError {
    fn from(e: BackoffError<ProbeError>) -> Self {
        match e {
            BackoffError::Cancelled => HealthCheckError::Cancelled,
            BackoffError::Aborted(e) => HealthCheckError::Probe(e),
        }
    }
}

struct PodTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

type TaskSlot = Arc<Mutex<Option<PodTask>>>;

struct SchedulerInner {
    registry: Arc<PodRegistry>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    policy: BackoffPolicy,
    suspended: AtomicBool,
    /// Parent of every per-pod token.
    shutdown: CancellationToken,
    tasks: DashMap<Url, TaskSlot>,
}

/// Owns the prober tasks of every monitored pod.
#[derive(Clone)]
pub struct HealthScheduler {
    inner: Arc<SchedulerInner>,
}

impl HealthScheduler {
    pub fn new(registry: Arc<PodRegistry>, probe: Arc<dyn Probe>, config: &HealthCheckConfig) -> Self {
        Self::with_policy(
            registry,
            probe,
            Duration::from_millis(config.interval_ms),
            BackoffPolicy::from(config),
        )
    }

    pub fn with_policy(
        registry: Arc<PodRegistry>,
        probe: Arc<dyn Probe>,
        interval: Duration,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                probe,
                interval,
                policy,
                suspended: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                tasks: DashMap::new(),
            }),
        }
    }

    /// Subscribe to the registry events this scheduler reacts to.
    pub fn attach(&self) {
        let subscriber: Arc<dyn PodEventSubscriber> = Arc::new(self.clone());
        self.inner.registry.subscribe(PodEvent::AddPod, subscriber.clone());
        self.inner.registry.subscribe(PodEvent::UpdatePod, subscriber);
    }

    /// Schedule every pod currently `Alive` in the registry.
    pub fn start(&self) {
        let alive: Vec<_> = self
            .inner
            .registry
            .get_all()
            .into_iter()
            .filter(BackendPod::is_alive)
            .collect();

        tracing::info!(
            pods = alive.len(),
            interval = ?self.inner.interval,
            max_tries = self.inner.policy.max_tries,
            "Health scheduler starting"
        );

        for pod in alive {
            let this = self.clone();
            tokio::spawn(async move { this.schedule_pod(pod).await });
        }
    }

    /// Install a prober for `pod`, replacing any task it already has.
    ///
    /// The previous task is cancelled and fully joined before the new one
    /// is spawned; concurrent calls for the same pod are serialized.
    pub async fn schedule_pod(&self, pod: BackendPod) {
        self.prune_finished();

        let slot = self
            .inner
            .tasks
            .entry(pod.uri().clone())
            .or_default()
            .value()
            .clone();
        let mut current = slot.lock().await;

        if let Some(old) = current.take() {
            old.cancel.cancel();
            if let Err(e) = old.handle.await {
                tracing::warn!(pod = %pod.uri(), error = %e, "Previous prober task ended abnormally");
            }
            tracing::debug!(pod = %pod.uri(), "Replaced prober task");
        }

        let cancel = self.inner.shutdown.child_token();
        let inner = self.inner.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { inner.run_pod(pod, task_cancel).await });

        *current = Some(PodTask { cancel, handle });
    }

    /// Probe `pod` once (with retries) and record the resulting transitions.
    pub async fn send_health_check(&self, pod: &BackendPod) -> Result<HealthCheckResponse, HealthCheckError> {
        self.inner.send_health_check(pod, &self.inner.shutdown).await
    }

    pub fn stop(&self) {
        tracing::info!("Health scheduler suspended");
        self.inner.suspended.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Stop, cancel every prober and wait for all of them to exit.
    pub async fn shutdown(&self) {
        self.stop();
        self.inner.shutdown.cancel();

        let slots: Vec<TaskSlot> = self.inner.tasks.iter().map(|e| e.value().clone()).collect();
        let handles = join_all(slots.iter().map(|slot| async move { slot.lock().await.take() })).await;
        join_all(handles.into_iter().flatten().map(|task| task.handle)).await;
        self.inner.tasks.clear();
        tracing::info!("Health scheduler shut down");
    }

    /// Number of prober tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.inner
            .tasks
            .iter()
            .filter(|entry| match entry.value().try_lock() {
                Ok(task) => task.as_ref().is_some_and(|t| !t.handle.is_finished()),
                // Being replaced right now
                Err(_) => true,
            })
            .count()
    }

    /// Drop slots of finished tasks that nobody else is holding.
    fn prune_finished(&self) {
        self.inner.tasks.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(task) => task.as_ref().is_some_and(|t| !t.handle.is_finished()),
                Err(_) => true,
            }
        });
    }
}

impl SchedulerInner {
    fn is_stopped(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn run_pod(self: Arc<Self>, pod: BackendPod, cancel: CancellationToken) {
        let pod = if pod.status() == PodStatus::Initializing {
            match self.await_ready(pod, &cancel).await {
                Some(ready) => ready,
                None => return,
            }
        } else {
            pod
        };

        tracing::debug!(pod = %pod.uri(), "Prober task running");

        while !self.is_stopped() && !cancel.is_cancelled() {
            match self.send_health_check(&pod, &cancel).await {
                Ok(response) if response.status == PodStatus::Dead => break,
                Ok(_) => {}
                Err(HealthCheckError::Cancelled) => break,
                Err(e) => {
                    tracing::warn!(pod = %pod.uri(), error = %e, "Health check could not run");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::debug!(pod = %pod.uri(), "Prober task exiting");
    }

    /// Probe a registered pod until it answers, then publish it as ready.
    ///
    /// Returns the ready pod, or `None` if the pod was given up on (and
    /// removed) or the task was cancelled.
    async fn await_ready(&self, pod: BackendPod, cancel: &CancellationToken) -> Option<BackendPod> {
        let outcome = Backoff::new(self.policy)
            .on_termination(|| self.transition(&pod, PodStatus::Dead))
            .execute(|| self.probe.probe(&pod), cancel)
            .await;

        match outcome {
            Ok(Outcome::Success) => {
                let ready = pod.with_status(PodStatus::Alive);
                if let Err(e) = self.registry.make_ready(ready.clone()) {
                    tracing::warn!(pod = %pod.uri(), error = %e, "Readiness not fully delivered");
                }
                Some(ready)
            }
            Ok(Outcome::Fail) => {
                tracing::warn!(pod = %pod.uri(), "Pod never became ready, dropped");
                None
            }
            Err(BackoffError::Cancelled) => None,
            Err(BackoffError::Aborted(e)) => {
                tracing::error!(pod = %pod.uri(), error = %e, "Readiness probe cannot run, dropping pod");
                self.transition(&pod, PodStatus::Dead);
                None
            }
        }
    }

    async fn send_health_check(
        &self,
        pod: &BackendPod,
        cancel: &CancellationToken,
    ) -> Result<HealthCheckResponse, HealthCheckError> {
        let outcome = Backoff::new(self.policy)
            .on_retry(|| self.transition(pod, PodStatus::Unresponsive))
            .on_termination(|| self.transition(pod, PodStatus::Dead))
            .on_retry_cleanup(|| self.transition(pod, PodStatus::Alive))
            .execute(|| self.probe.probe(pod), cancel)
            .await?;

        Ok(match outcome {
            Outcome::Success => HealthCheckResponse::success(),
            Outcome::Fail => HealthCheckResponse::dead(),
        })
    }

    fn transition(&self, pod: &BackendPod, status: PodStatus) {
        tracing::info!(pod = %pod.uri(), status = %status, "Pod status transition");
        if let Err(e) = self.registry.update(pod.with_status(status)) {
            tracing::warn!(pod = %pod.uri(), error = %e, "Status transition not fully delivered");
        }
    }
}

impl PodEventSubscriber for HealthScheduler {
    fn id(&self) -> &str {
        "health-scheduler"
    }

    fn handle_event(&self, context: &PodEventContext) -> Result<(), SubscriberError> {
        let targets: Vec<BackendPod> = match context.event {
            PodEvent::AddPod => context
                .affected
                .iter()
                .filter(|p| matches!(p.status(), PodStatus::Alive | PodStatus::Initializing))
                .cloned()
                .collect(),
            PodEvent::UpdatePod => context.affected.iter().filter(|p| p.is_alive()).cloned().collect(),
            PodEvent::RemovePod | PodEvent::PodReady => return Ok(()),
        };

        if targets.is_empty() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SubscriberError::NoRuntime(e.to_string()))?;
        for pod in targets {
            let this = self.clone();
            runtime.spawn(async move { this.schedule_pod(pod).await });
        }
        Ok(())
    }
}
