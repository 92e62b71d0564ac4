//! podbalancer: a round-robin HTTP load balancer with self-healing pod
//! membership.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!   POST          │  ┌──────────┐   add    ┌──────────────┐              │
//!   /lbregister ──┼─▶│ register │────────▶ │ PodRegistry  │──┐ events    │
//!                 │  └──────────┘          └──────▲───────┘  │           │
//!                 │                  update/remove│          ▼           │
//!                 │                        ┌──────┴───────────────┐      │
//!                 │                        │   HealthScheduler    │      │
//!                 │                        │ probe + backoff/pod  │      │
//!                 │                        └──────────────────────┘      │
//!                 │                                  │ PodReady/Remove   │
//!                 │                                  ▼                   │
//!   Client  ──────┼─▶ forward ──── next_pod ──▶ ┌──────────────┐         │
//!   Request       │      │                      │  RoundRobin  │         │
//!                 │      └──── hyper client ──▶ pod            │         │
//!                 │                             └──────────────┘         │
//!                 └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod registry;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{Balancer, Shutdown};
pub use load_balancer::pod::{BackendPod, PodStatus};
pub use registry::{PodEvent, PodRegistry};
