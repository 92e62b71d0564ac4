//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → register.rs  POST <register_path>: new pod → registry.add
//!     → forward.rs   any other path:
//!           LoadBalancer::next_pod
//!           → headers.rs (strip hop-by-hop / restricted)
//!           → hyper client, bounded by the forwarding timeout
//!           → response relayed to the client
//! ```

pub mod forward;
pub mod headers;
pub mod register;
pub mod server;

pub use forward::ForwardError;
pub use register::{RegisterError, RegisterRequest};
pub use server::{AppState, HttpServer, X_REQUEST_ID};
