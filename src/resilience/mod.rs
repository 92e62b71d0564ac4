//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Health probe for a pod:
//!     → backoff.rs (retry transient failures with growing delay)
//!     → handlers report degraded / recovered / terminated to the caller
//! ```
//!
//! # Design Decisions
//! - Only failures classified as retryable are retried
//! - The engine knows nothing about pods or HTTP
//! - Every sleep is cancellable; cancellation is not an outcome

pub mod backoff;

pub use backoff::{Backoff, BackoffError, BackoffPolicy, Outcome, Retryable};
