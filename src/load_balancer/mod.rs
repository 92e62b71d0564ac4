//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry events (PodReady / AddPod / RemovePod)
//!     → round_robin.rs (rotation kept free of dead pods)
//!
//! Inbound request
//!     → LoadBalancer::next_pod (head of rotation moves to the tail)
//!     → pod.rs (base URI used to build the outbound target)
//! ```
//!
//! # Design Decisions
//! - Liveness is enforced by membership, not by skipping in `next`
//! - An empty rotation yields `None`, never an error
//! - Unresponsive pods stay in rotation until they are declared dead

pub mod pod;
pub mod round_robin;

use crate::load_balancer::pod::BackendPod;

/// Picks the pod that serves the next request.
pub trait LoadBalancer: Send + Sync {
    fn next_pod(&self) -> Option<BackendPod>;
}
