//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! scheduler.rs, one task per pod:
//!     readiness (Initializing pods only)
//!         → probe until it answers → registry.make_ready (PodReady)
//!     periodic loop
//!         → probe.rs (HTTP GET health path, or TCP connect)
//!         → resilience::backoff (retry transient failures)
//!         → registry.update (Unresponsive / Alive / Dead)
//!         → sleep interval, repeat until Dead, stopped or cancelled
//! ```
//!
//! # State Machine
//! ```text
//! Alive → Unresponsive: first failed probe
//! Unresponsive → Alive: a retry succeeds
//! Unresponsive → Dead: retries exhausted (pod removed from the registry)
//! ```

pub mod probe;
pub mod scheduler;

pub use probe::{HttpProbe, Probe, ProbeError, TcpProbe};
pub use scheduler::{HealthCheckError, HealthCheckResponse, HealthScheduler};
