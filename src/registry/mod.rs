//! Pod registry subsystem.
//!
//! # Data Flow
//! ```text
//! Registration endpoint / health scheduler
//!     → store.rs (add / update / remove / make_ready)
//!     → events.rs (PodEventContext built for the mutation)
//!     → every subscriber of that event kind, in-line
//!     → mutating call returns
//! ```
//!
//! # Design Decisions
//! - Single explicit registry instance shared via Arc, no global state
//! - Events are delivered synchronously before the mutation returns
//! - A failing subscriber does not stop delivery to the others; the
//!   failure is reported back to the caller of the mutation
//! - Dead pods are never stored: updating to Dead removes the pod

pub mod events;
pub mod store;

pub use events::{PodEvent, PodEventContext, PodEventSubscriber, SubscriberError};
pub use store::{PodRegistry, RegistryError};
